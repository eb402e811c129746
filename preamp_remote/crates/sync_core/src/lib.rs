mod modules;

pub use modules::actor::{self, spawn, DriverEvent, HostCommand, SyncHandle};
pub use modules::client::SyncClient;
pub use modules::config::{self, DebounceDelays, Endpoints, SyncConfig};
pub use modules::debounce::{self, Control, Debouncer};
pub use modules::http::HttpFallback;
pub use modules::error::{ActorUnavailable, ConfigError, FetchError, TransportError};
pub use modules::lifecycle::{self, LifecycleCoordinator};
pub use modules::model::{LinkStatus, SyncModel, SyncUpdate};
pub use modules::poller::{self, CommandOutcome, FallbackApi, PollOutcome, PollRequest, PollSkip};
pub use modules::queue::{self, CommandQueue, FlushReport, OutboundCommand};
pub use modules::throttle::{self, SyncDecision, SyncKind, SyncThrottle};
pub use modules::transport::{
    self, CloseInfo, ConnectionId, ConnectionState, HealthVerdict, LiveTransport,
};
pub use modules::ws::WsTransport;

pub use preamp_protocol as protocol;
