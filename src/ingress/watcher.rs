//! Ingress watcher
//!
//! Streams Ingress changes from the API server and turns them into
//! [`FeedMessage`]s. The kube watcher only reports "applied" and "deleted",
//! so a local cache of the last decoded object per key is kept to tell an
//! add from an update and to hand the old object to the gateway.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures_util::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Client, Config};
use tokio::sync::mpsc;
use tokio::time::{self, Interval};

use crate::config::KubernetesConfig;
use crate::error::GatewayError;
use crate::ingress::decode::{decode_ingress, is_selected, object_key};
use crate::ingress::types::{FeedMessage, IngressEvent, IngressObject};
use crate::lifecycle::ShutdownSignal;

/// Last known routing content of every selected Ingress.
///
/// Pure bookkeeping: feed it watcher events, get back the messages to
/// deliver. Kept apart from the stream so it can be tested without a cluster.
#[derive(Debug, Default)]
pub struct ObjectCache {
    ingress_class: Option<String>,
    objects: HashMap<String, IngressObject>,
    /// Keys seen since the current re-list began, if one is in progress.
    relist: Option<HashSet<String>>,
}

impl ObjectCache {
    pub fn new(ingress_class: Option<String>) -> Self {
        Self {
            ingress_class,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Translate one watcher event.
    pub fn observe(&mut self, event: Event<Ingress>) -> Vec<FeedMessage> {
        match event {
            Event::Init => {
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            Event::InitApply(ingress) => {
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(object_key(&ingress));
                }
                self.apply(&ingress).into_iter().collect()
            }
            Event::InitDone => {
                let mut messages = Vec::new();
                if let Some(seen) = self.relist.take() {
                    let stale: Vec<String> = self
                        .objects
                        .keys()
                        .filter(|key| !seen.contains(*key))
                        .cloned()
                        .collect();
                    for key in stale {
                        if let Some(old) = self.objects.remove(&key) {
                            messages.push(FeedMessage::Event(IngressEvent::Deleted(old)));
                        }
                    }
                }
                messages.push(FeedMessage::Synced);
                messages
            }
            Event::Apply(ingress) => self.apply(&ingress).into_iter().collect(),
            Event::Delete(ingress) => self
                .objects
                .remove(&object_key(&ingress))
                .map(|old| FeedMessage::Event(IngressEvent::Deleted(old)))
                .into_iter()
                .collect(),
        }
    }

    /// Re-deliver every cached object as an update onto itself.
    pub fn resync(&self) -> Vec<FeedMessage> {
        self.objects
            .values()
            .map(|obj| {
                FeedMessage::Event(IngressEvent::Updated {
                    old: obj.clone(),
                    new: obj.clone(),
                })
            })
            .collect()
    }

    fn apply(&mut self, ingress: &Ingress) -> Option<FeedMessage> {
        let key = object_key(ingress);

        if !is_selected(ingress, self.ingress_class.as_deref()) {
            // An object that moved to another class is gone as far as we care.
            return self
                .objects
                .remove(&key)
                .map(|old| FeedMessage::Event(IngressEvent::Deleted(old)));
        }

        let new = decode_ingress(ingress);
        let event = match self.objects.insert(key, new.clone()) {
            Some(old) => IngressEvent::Updated { old, new },
            None => IngressEvent::Added(new),
        };
        Some(FeedMessage::Event(event))
    }
}

/// Build a client from an explicit kubeconfig, or infer one.
pub async fn build_client(config: &KubernetesConfig) -> Result<Client, GatewayError> {
    let options = KubeConfigOptions {
        context: config.context.clone(),
        ..Default::default()
    };

    let client_config = match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &options).await?
        }
        None if config.context.is_some() => Config::from_kubeconfig(&options).await?,
        None => Config::infer().await?,
    };

    Ok(Client::try_from(client_config)?)
}

/// Watches Ingresses and feeds the gateway.
pub struct IngressWatcher {
    api: Api<Ingress>,
    ingress_class: Option<String>,
    resync: Option<Duration>,
}

impl IngressWatcher {
    /// Connect to the API server and verify Ingresses can be listed.
    pub async fn connect(config: &KubernetesConfig) -> Result<Self, GatewayError> {
        let client = build_client(config).await?;
        let api: Api<Ingress> = match &config.namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };

        // Fail startup now rather than serve nothing forever.
        api.list(&ListParams::default().limit(1)).await?;

        tracing::info!(
            namespace = config.namespace.as_deref().unwrap_or("*"),
            ingress_class = config.ingress_class.as_deref().unwrap_or("*"),
            "Connected to Kubernetes API"
        );

        Ok(Self {
            api,
            ingress_class: config.ingress_class.clone(),
            resync: config.resync_interval(),
        })
    }

    /// Stream changes into `tx` until shutdown or until the receiver is gone.
    pub async fn run(self, tx: mpsc::UnboundedSender<FeedMessage>, mut shutdown: ShutdownSignal) {
        let stream = watcher::watcher(self.api.clone(), watcher::Config::default()).default_backoff();
        futures_util::pin_mut!(stream);

        let mut cache = ObjectCache::new(self.ingress_class.clone());
        let mut resync = self
            .resync
            .map(|period| time::interval_at(time::Instant::now() + period, period));

        tracing::info!("Starting Ingress watcher");

        loop {
            let messages = tokio::select! {
                _ = shutdown.wait() => {
                    tracing::info!("Ingress watcher received shutdown signal");
                    break;
                }
                _ = tick(&mut resync) => {
                    tracing::debug!(objects = cache.len(), "Resyncing Ingresses");
                    cache.resync()
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => cache.observe(event),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Ingress watcher error");
                        continue;
                    }
                    None => {
                        tracing::warn!("Ingress watch stream ended");
                        break;
                    }
                },
            };

            for message in messages {
                if tx.send(message).is_err() {
                    tracing::debug!("Feed receiver dropped, stopping watcher");
                    return;
                }
            }
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
