pub mod credentials;
pub mod model;
pub mod select;
pub mod settings;
pub mod urls;
pub mod wire;

pub use credentials::Credentials;
pub use model::{
    Activity, ActivityStatus, Attachment, Envelope, EnvelopeFeedbacks, EnvelopeFile,
    EnvelopeHistory, EnvelopeListing, EnvelopeRef, Feedback, WorkItem,
};
pub use settings::{MappingError, Obligation, Settings, SettingsError};
pub use urls::EnvelopeQuery;
pub use wire::{WireError, parse_wire_date};
