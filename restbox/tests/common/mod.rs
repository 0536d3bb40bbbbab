#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use restbox::{BaseClient, ClientDefaults, ClientOverrides};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::Registry;

/// Client over fresh defaults, so tests never share the global cache.
pub fn client(base_uri: &str, overrides: ClientOverrides) -> BaseClient {
    BaseClient::with_defaults(&ClientDefaults::new(), overrides.base_uri(base_uri))
        .expect("client must build")
}

/// A log event seen by [`LogCollector`].
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

struct EventCaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for EventCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target() != restbox::logging::LOG_TARGET {
            return;
        }
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
        });
    }
}

/// Collects `restbox` log events while installed as the default subscriber.
#[derive(Clone)]
pub struct LogCollector {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCollector {
    /// Installs the collector for the current thread until the guard drops.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default().with(EventCaptureLayer {
            events: events.clone(),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        (Self { events }, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .map(|event| event.message)
            .collect()
    }
}
