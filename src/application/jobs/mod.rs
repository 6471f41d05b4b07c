mod refresh_profiles;

pub use refresh_profiles::{
    RefreshJobContext, RefreshProfilesJob, process_refresh_profiles_job, spawn_refresh_monitor,
};
