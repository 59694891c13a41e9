// Fixed-size worker pool for connection handlers.
//
// Every accepted connection becomes one job. A job runs for the whole life of
// its connection (handshake, waiting, relaying), so the pool size is also the
// number of clients the relay serves at once. Further connections queue in
// the job channel until a worker frees up.
//
// Dropping the pool closes the channel and joins the workers, which exit once
// the remaining queued jobs have run.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..size.max(1))
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || worker_loop(index, &receiver))
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(Box::new(job)).is_err() {
            warn!("worker pool is shut down, dropping job");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(index: usize, receiver: &Mutex<Receiver<Job>>) {
    loop {
        // Hold the lock only while waiting for the next job.
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        match next {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
    debug!("worker {index} exiting");
}
