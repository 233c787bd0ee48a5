pub mod backup_config;
pub mod execute;
pub mod glob;
pub mod locate;
pub mod plan;
pub mod report;
pub mod resolve;
pub mod result_error;
pub mod skip;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
