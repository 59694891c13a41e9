// The 8x8 Othello board.
//
// Cells are stored row-major (`cells[y][x]`). Legality and flip computation
// walk the eight compass directions from the placed square; a direction
// contributes its run of opponent discs only when the run is terminated by
// one of the mover's own discs. Enumeration order is row-major (y outer, x
// inner), which the greedy oracle relies on for its tie-break.

use std::fmt;

use crate::types::{BOARD_SIZE, Cell, Color, Coord};

/// The eight (dx, dy) unit steps: N, S, W, E, NW, NE, SW, SE.
const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

const SIDE: usize = BOARD_SIZE as usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [[Cell; SIDE]; SIDE],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// The standard opening: White on (3,3) and (4,4), Black on (4,3) and
    /// (3,4).
    pub fn new() -> Self {
        let mut board = Self::empty();
        board.set(Coord::new(3, 3), Cell::White);
        board.set(Coord::new(4, 4), Cell::White);
        board.set(Coord::new(4, 3), Cell::Black);
        board.set(Coord::new(3, 4), Cell::Black);
        board
    }

    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; SIDE]; SIDE],
        }
    }

    /// Build a board from eight strings of eight characters each. `B` is
    /// black, `W` is white, anything else is empty. Missing rows or columns
    /// are left empty.
    pub fn from_rows(rows: &[&str]) -> Self {
        let mut board = Self::empty();
        for (y, row) in rows.iter().take(SIDE).enumerate() {
            for (x, ch) in row.chars().take(SIDE).enumerate() {
                board.cells[y][x] = match ch {
                    'B' => Cell::Black,
                    'W' => Cell::White,
                    _ => Cell::Empty,
                };
            }
        }
        board
    }

    pub fn is_in_bounds(x: i32, y: i32) -> bool {
        Coord::new(x, y).in_bounds()
    }

    /// Contents of `coord`, or `None` when it is off the board.
    pub fn get(&self, coord: Coord) -> Option<Cell> {
        if !coord.in_bounds() {
            return None;
        }
        Some(self.cells[coord.y as usize][coord.x as usize])
    }

    pub(crate) fn set(&mut self, coord: Coord, cell: Cell) {
        if coord.in_bounds() {
            self.cells[coord.y as usize][coord.x as usize] = cell;
        }
    }

    /// Discs that would flip if `player` placed at `coord`. Empty when the
    /// square is off-board, occupied, or captures nothing.
    pub fn compute_flips(&self, coord: Coord, player: Color) -> Vec<Coord> {
        let mut flips = Vec::new();
        if self.get(coord) != Some(Cell::Empty) {
            return flips;
        }
        let own = Cell::from(player);
        let theirs = Cell::from(player.opponent());
        for (dx, dy) in DIRECTIONS {
            let mut run = Vec::new();
            let mut cursor = coord.offset(dx, dy);
            while self.get(cursor) == Some(theirs) {
                run.push(cursor);
                cursor = cursor.offset(dx, dy);
            }
            if !run.is_empty() && self.get(cursor) == Some(own) {
                flips.extend(run);
            }
        }
        flips
    }

    pub fn is_legal(&self, coord: Coord, player: Color) -> bool {
        !self.compute_flips(coord, player).is_empty()
    }

    /// Place a disc for `player` and flip the captured discs. Returns false,
    /// leaving the board untouched, when the move is illegal.
    pub fn apply_move(&mut self, coord: Coord, player: Color) -> bool {
        self.place(coord, player).is_some()
    }

    /// Like `apply_move`, but hands back the flipped coordinates.
    pub fn place(&mut self, coord: Coord, player: Color) -> Option<Vec<Coord>> {
        let flips = self.compute_flips(coord, player);
        if flips.is_empty() {
            return None;
        }
        let own = Cell::from(player);
        self.set(coord, own);
        for &flipped in &flips {
            self.set(flipped, own);
        }
        Some(flips)
    }

    /// Every legal move for `player`, in row-major order.
    pub fn legal_moves(&self, player: Color) -> Vec<Coord> {
        let mut moves = Vec::new();
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                let coord = Coord::new(x, y);
                if self.is_legal(coord, player) {
                    moves.push(coord);
                }
            }
        }
        moves
    }

    pub fn has_legal_move(&self, player: Color) -> bool {
        (0..BOARD_SIZE)
            .flat_map(|y| (0..BOARD_SIZE).map(move |x| Coord::new(x, y)))
            .any(|coord| self.is_legal(coord, player))
    }

    /// Number of discs of `player` currently on the board.
    pub fn score(&self, player: Color) -> u32 {
        self.count(Cell::from(player))
    }

    pub fn empty_count(&self) -> u32 {
        self.count(Cell::Empty)
    }

    fn count(&self, wanted: Cell) -> u32 {
        self.cells
            .iter()
            .flatten()
            .filter(|&&cell| cell == wanted)
            .count() as u32
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  0 1 2 3 4 5 6 7")?;
        for (y, row) in self.cells.iter().enumerate() {
            write!(f, "{y}")?;
            for cell in row {
                let glyph = match cell {
                    Cell::Empty => '.',
                    Cell::Black => 'B',
                    Cell::White => 'W',
                };
                write!(f, " {glyph}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
