use std::{
    io,
    sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use enemy_down_core::NewScoreRecord;
use enemy_down_score_store::ScoreStore;
use enemy_down_world::lock;

enum Message {
    Record(NewScoreRecord),
    Flush(Sender<()>),
}

/// Background writer that keeps persistence off the timer path.
///
/// Every record gets exactly one insert attempt; failures are logged and dropped.
pub(crate) struct ScoreRecorder {
    sender: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScoreRecorder {
    pub(crate) fn spawn(store: Arc<dyn ScoreStore>) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("enemy-down-recorder".to_owned())
            .spawn(move || {
                for message in receiver {
                    match message {
                        Message::Record(record) => write(store.as_ref(), record),
                        Message::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                log::debug!("score recorder stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub(crate) fn submit(&self, record: NewScoreRecord) {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            log::error!(
                "score recorder is shut down; dropping score {} for {}",
                record.score,
                record.player_name
            );
            return;
        };
        if let Err(mpsc::SendError(Message::Record(record))) = sender.send(Message::Record(record))
        {
            log::error!(
                "score recorder exited; dropping score {} for {}",
                record.score,
                record.player_name
            );
        }
    }

    /// Blocks until every record submitted so far has been attempted.
    pub(crate) fn flush(&self) {
        let (done, wait) = mpsc::channel();
        let sent = lock(&self.sender)
            .as_ref()
            .is_some_and(|sender| sender.send(Message::Flush(done)).is_ok());
        if sent {
            let _ = wait.recv();
        }
    }

    /// Closes the queue, drains it and joins the worker. Later calls do nothing.
    pub(crate) fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::error!("score recorder panicked");
            }
        }
    }
}

fn write(store: &dyn ScoreStore, record: NewScoreRecord) {
    let player = record.player_name.clone();
    match store.insert(record) {
        Ok(stored) => log::info!(
            "recorded score {} for {} as #{}",
            stored.score,
            stored.player_name,
            stored.id
        ),
        Err(error) => log::error!("failed to record score for {player}: {error}"),
    }
}
