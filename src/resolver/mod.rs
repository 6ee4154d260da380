pub mod dependency;

pub use dependency::{
    Dependency, DependencyResolver, ExecutableLookup, InstallSettings, ResolvedDependencies,
    SystemPath,
};
