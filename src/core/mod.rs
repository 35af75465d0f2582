//! Core runtime components: sensing, snapshot store, sampling loop,
//! exposition server, and the supervisor that ties their lifecycles
//! together.

pub mod sampler;
pub mod sensor;
pub mod server;
pub mod snapshot;
pub mod supervisor;
