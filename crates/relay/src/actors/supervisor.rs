use std::{collections::HashMap, time::Duration};
use tracing::{error, info, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::actors::{Actor, ActorType, ControlMessage};

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

const CHECK_INTERVAL: Duration = Duration::from_secs(1);
const PULSE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Runs forever. Actors whose heartbeat stops (crashed, hung or
    /// finished with an error) are aborted and rebuilt from their factory.
    pub async fn start(&mut self) {
        let mut check_interval = time::interval(CHECK_INTERVAL);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        actors.into_iter().for_each(|actor| {
            self.spawn_actor(actor, supervisor_tx.clone());
        });

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type) => {
                            if self.handles.contains_key(&actor_type) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(actor_type) => {
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            self.pulses.remove(&actor_type);
                            if let Some(handle) = self.handles.remove(&actor_type) {
                                handle.abort();
                            }
                        },
                        ControlMessage::Error(actor_type, error_msg) => {
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                        },
                    }
                }

                _ = check_interval.tick() => {
                    for actor_type in self.unresponsive(Instant::now()) {
                        warn!("{:?} is unresponsive, restarting", actor_type);
                        if let Some(handle) = self.handles.get(&actor_type) {
                            handle.abort();
                        }
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn unresponsive(&self, now: Instant) -> Vec<ActorType> {
        self.pulses
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > PULSE_TIMEOUT)
            .map(|(actor_type, _)| *actor_type)
            .collect()
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            return;
        };
        let mut new_actor = factory();
        info!("Spawning {:?}", actor_type);
        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", actor_type, e);
            }
        });
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}
