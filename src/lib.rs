pub mod config;
pub mod error;
pub mod events;
pub mod source;
pub mod zoom;
pub mod processing {
    pub mod resample;
}
pub mod tasks {
    #[cfg(unix)]
    pub mod control;
    pub mod loader;
    pub mod rescale;
    pub mod viewer;
    pub mod worker;
}
