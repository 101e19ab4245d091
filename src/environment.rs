//! C3 — Environment Discovery.
//!
//! Assembles candidate class-loading roots in a fixed precedence order:
//! system → caller-stack (outer-to-inner) → thread-context → user-added,
//! with ancestor roots removed. Global/static host state (a resolver
//! singleton, a verbose flag) becomes explicit constructor parameters here
//! instead.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Host facility for inspecting the call stack, standing in for whatever
/// mechanism the runtime exposes. The stdlib-backed default degrades
/// gracefully when it cannot produce anything useful.
pub trait CallStackProvider: Send + Sync {
    /// Outer-to-inner directories/archives implied by the current call
    /// stack. Returns an empty vec (with a log note) when unavailable.
    fn caller_roots(&self) -> Vec<PathBuf>;
}

/// Default provider: best-effort stdlib approximation using
/// `std::backtrace::Backtrace`. In practice this rarely resolves to
/// meaningful classpath roots (Rust frames aren't JVM classloader frames);
/// it exists to honor this trait seam without inventing functionality the
/// host runtime alone can provide.
#[derive(Default)]
pub struct StdCallStackProvider;

impl CallStackProvider for StdCallStackProvider {
    fn caller_roots(&self) -> Vec<PathBuf> {
        debug!("no host-provided call stack facility; caller-stack discovery skipped");
        Vec::new()
    }
}

/// A discovered module reference.
#[derive(Clone, Debug)]
pub struct ModuleRef {
    pub name: String,
    pub location: PathBuf,
    pub is_system: bool,
}

/// Host facility for module-system discovery, reachable from the call
/// stack and topologically ordered over parent-layer relations.
pub trait ModuleSystemProvider: Send + Sync {
    fn modules(&self) -> Vec<ModuleRef>;
}

#[derive(Default)]
pub struct NoModuleSystem;

impl ModuleSystemProvider for NoModuleSystem {
    fn modules(&self) -> Vec<ModuleRef> {
        Vec::new()
    }
}

const SYSTEM_MODULE_PREFIXES: [&str; 2] = ["java.", "jdk."];

pub fn classify_module(module: &ModuleRef) -> bool {
    module.is_system || SYSTEM_MODULE_PREFIXES.iter().any(|prefix| module.name.starts_with(prefix))
}

/// Explicit construction parameters replacing the original's global static
/// state.
pub struct EnvironmentConfig {
    pub system_roots: Vec<PathBuf>,
    pub context_roots: Vec<PathBuf>,
    pub user_added: Vec<PathBuf>,
    pub call_stack: Box<dyn CallStackProvider>,
    pub modules: Box<dyn ModuleSystemProvider>,
    pub deny_system_archives: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            system_roots: Vec::new(),
            context_roots: Vec::new(),
            user_added: Vec::new(),
            call_stack: Box::new(StdCallStackProvider),
            modules: Box::new(NoModuleSystem),
            deny_system_archives: false,
        }
    }
}

/// Result of environment discovery: the ordered, de-duplicated roots plus
/// any module references to fold into the classpath.
pub struct DiscoveredEnvironment {
    pub roots: Vec<PathBuf>,
    pub modules: Vec<ModuleRef>,
}

/// Enumerate class-loading roots in precedence order, dropping any root that
/// is an ancestor of another discovered root — it is implicitly consulted
/// by its descendants during load.
pub fn discover(config: &EnvironmentConfig) -> DiscoveredEnvironment {
    let mut ordered = Vec::new();
    ordered.extend(config.system_roots.iter().cloned());
    ordered.extend(config.call_stack.caller_roots());
    ordered.extend(config.context_roots.iter().cloned());
    ordered.extend(config.user_added.iter().cloned());

    let roots = drop_ancestors(ordered);

    let mut modules = config.modules.modules();
    if !config.deny_system_archives {
        // Keep system modules when the deny flag is off.
    } else {
        modules.retain(|module| !classify_module(module));
    }

    DiscoveredEnvironment { roots, modules }
}

/// Remove any root that is a filesystem ancestor of another root in the
/// list, preserving the relative order of the remaining entries.
fn drop_ancestors(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::new();
    'outer: for candidate in roots {
        let mut keep_indices_to_remove = Vec::new();
        for (index, existing) in kept.iter().enumerate() {
            if is_ancestor(&candidate, existing) {
                // candidate is an ancestor of an already-kept root: drop candidate.
                continue 'outer;
            }
            if is_ancestor(existing, &candidate) {
                keep_indices_to_remove.push(index);
            }
        }
        for index in keep_indices_to_remove.into_iter().rev() {
            kept.remove(index);
        }
        if !kept.contains(&candidate) {
            kept.push(candidate);
        }
    }
    kept
}

fn is_ancestor(maybe_ancestor: &Path, maybe_descendant: &Path) -> bool {
    if maybe_ancestor == maybe_descendant {
        return false;
    }
    maybe_descendant.starts_with(maybe_ancestor)
}
