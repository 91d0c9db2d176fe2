pub use self::parser::{
    ChatConfig, Config, DatabaseConfig, LimitsConfig, LoggingConfig, ServiceConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
