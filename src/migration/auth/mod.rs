pub mod secret;

pub use secret::{ChannelSecrets, Secret, SecretAuthority, MIN_SECRET_BYTES};
