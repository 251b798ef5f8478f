use crate::jvm::class_file::Version;
use crate::jvm::{BinaryName, UnqualifiedName};

pub struct Settings {
    /// Runtime class backing `cflow` and `cflowbelow`, written as `my/runtime/Counter`
    ///
    /// It needs a no-argument constructor and instance methods `inc()V`, `dec()V`, and
    /// `isValid()Z`.
    pub cflow_counter_class: BinaryName,

    /// Prefix of the static fields holding cflow counters on aspects (eg. `cflowCounter$`)
    pub cflow_counter_prefix: UnqualifiedName,

    /// Class file version of woven classes
    ///
    /// Rewritten method bodies carry no stack map frames, so anything newer than Java 5 would
    /// fail verification.
    pub output_version: Version,

    /// Only reweave types whose dependencies changed since the last weave
    pub incremental: bool,

    /// Report lint-level diagnostics (eg. advice which never matched anything)
    pub lint: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            cflow_counter_class: BinaryName::CFLOW_COUNTER,
            cflow_counter_prefix: UnqualifiedName::CFLOW_COUNTER_PREFIX,
            output_version: Version::JAVA5,
            incremental: false,
            lint: true,
        }
    }
}
