pub mod helper_script;

pub use helper_script::{HelperScript, HelperScriptFetcher, HelperSpec, HttpSource, ScriptSource};
