//! Name resolution contexts
//!
//! A [`ResolutionContext`] is the active binding from qualified type names to
//! concrete class identities. The engine runs as one logical generation task
//! per thread, so the *active* context is thread-local; resolved lookups are
//! memoized per thread and the memo cache is invalidated whenever a different
//! context is installed, since the same qualified name can denote different
//! classes in different contexts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use super::class_info::{access_flags, ClassInfo, MethodInfo};
use super::{MethodSignature, Type, OBJECT_CLASS, STRING_CLASS, THROWABLE_CLASS};

/// Cap on inheritance-graph walks, so a cyclic or pathological hierarchy
/// cannot hang subtype queries.
const MAX_HIERARCHY_STEPS: usize = 10_000;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("class '{0}' cannot be resolved in the active context")]
    UnknownClass(String),
    #[error("no resolution context is installed on this thread")]
    NoContext,
}

/// A registry of known classes for one class-loading context.
#[derive(Debug)]
pub struct ResolutionContext {
    name: String,
    entries: HashMap<String, Rc<ClassInfo>>,
}

impl ResolutionContext {
    /// A context pre-seeded with the `java.lang` core the engine itself
    /// relies on (Object, String, the throwable hierarchy, the array
    /// supertypes and a minimal println surface).
    pub fn new(name: &str) -> Self {
        let mut context = Self { name: name.to_string(), entries: HashMap::new() };
        context.seed_core_classes();
        context
    }

    /// An entirely empty context; useful in tests that want full control
    /// over the known-class set.
    pub fn empty(name: &str) -> Self {
        Self { name: name.to_string(), entries: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a class, replacing any previous entry of the same name.
    /// Re-registering is how a generator publishes refreshed metadata for a
    /// class that was still under construction at first registration.
    pub fn register(&mut self, info: ClassInfo) -> Rc<ClassInfo> {
        let shared = Rc::new(info);
        self.entries.insert(shared.name.clone(), Rc::clone(&shared));
        shared
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<ClassInfo>> {
        self.entries.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Rc<ClassInfo>, ResolveError> {
        self.lookup(name).ok_or_else(|| ResolveError::UnknownClass(name.to_string()))
    }

    /// Resolve a possibly-simple name against an import list: exact
    /// qualified names win, then single-type imports, then on-demand
    /// (`pkg.*`) imports, then `java.lang`.
    pub fn resolve_imported(
        &self,
        name: &str,
        imports: &[String],
    ) -> Result<Rc<ClassInfo>, ResolveError> {
        if name.contains('.') {
            return self.resolve(name);
        }
        for import in imports {
            if let Some(simple) = import.rsplit('.').next() {
                if simple == name {
                    if let Some(info) = self.lookup(import) {
                        return Ok(info);
                    }
                }
            }
            if let Some(package) = import.strip_suffix(".*") {
                if let Some(info) = self.lookup(&format!("{}.{}", package, name)) {
                    return Ok(info);
                }
            }
        }
        self.resolve(&format!("java.lang.{}", name))
            .map_err(|_| ResolveError::UnknownClass(name.to_string()))
    }

    /// Reachability over the declared inheritance graph: is `from` a strict
    /// subtype of `to`? Unresolvable intermediate supertypes end that
    /// branch of the walk.
    pub fn is_subtype_of(&self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let mut pending = vec![from.to_string()];
        let mut steps = 0usize;
        while let Some(current) = pending.pop() {
            steps += 1;
            if steps > MAX_HIERARCHY_STEPS {
                log::debug!("subtype walk from '{}' exceeded step cap", from);
                return false;
            }
            let Some(info) = self.lookup(&current) else { continue };
            for parent in info
                .super_class
                .iter()
                .chain(info.interfaces.iter())
                .filter_map(|t| t.class_name())
            {
                if parent == to {
                    return true;
                }
                pending.push(parent.to_string());
            }
        }
        false
    }

    fn seed_core_classes(&mut self) {
        use access_flags::*;

        let object = ClassInfo {
            access: ACC_PUBLIC,
            name: OBJECT_CLASS.to_string(),
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![
                method(ACC_PUBLIC, "hashCode", Type::Int, vec![]),
                method(ACC_PUBLIC, "equals", Type::Boolean, vec![Type::object()]),
                method(ACC_PUBLIC, "toString", Type::string(), vec![]),
            ],
            constructors: vec![method(ACC_PUBLIC, "<init>", Type::Void, vec![])],
        };
        self.register(object);

        self.register(simple_class(STRING_CLASS, OBJECT_CLASS));
        self.register(interface_info("java.lang.Cloneable"));
        self.register(interface_info("java.io.Serializable"));

        let mut throwable = simple_class(THROWABLE_CLASS, OBJECT_CLASS);
        throwable.methods.push(method(ACC_PUBLIC, "getMessage", Type::string(), vec![]));
        throwable
            .constructors
            .push(method(ACC_PUBLIC, "<init>", Type::Void, vec![Type::string()]));
        self.register(throwable);

        for (name, super_name) in [
            ("java.lang.Exception", THROWABLE_CLASS),
            ("java.lang.Error", THROWABLE_CLASS),
            ("java.lang.RuntimeException", "java.lang.Exception"),
            ("java.lang.IllegalArgumentException", "java.lang.RuntimeException"),
            ("java.lang.IllegalStateException", "java.lang.RuntimeException"),
        ] {
            let mut info = simple_class(name, super_name);
            info.constructors
                .push(method(ACC_PUBLIC, "<init>", Type::Void, vec![Type::string()]));
            self.register(info);
        }

        let mut print_stream = simple_class("java.io.PrintStream", OBJECT_CLASS);
        print_stream.methods.push(method(ACC_PUBLIC, "println", Type::Void, vec![Type::Int]));
        print_stream
            .methods
            .push(method(ACC_PUBLIC, "println", Type::Void, vec![Type::string()]));
        self.register(print_stream);

        let mut system = simple_class("java.lang.System", OBJECT_CLASS);
        system.constructors.clear();
        system.fields.push(super::FieldInfo {
            access: ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
            name: "out".to_string(),
            field_type: Type::class("java.io.PrintStream"),
        });
        self.register(system);
    }
}

fn method(access: u16, name: &str, return_type: Type, parameters: Vec<Type>) -> MethodInfo {
    MethodInfo {
        access,
        name: name.to_string(),
        signature: MethodSignature::new(return_type, parameters),
        exceptions: vec![],
    }
}

fn simple_class(name: &str, super_name: &str) -> ClassInfo {
    ClassInfo {
        access: access_flags::ACC_PUBLIC,
        name: name.to_string(),
        super_class: Some(Type::class(super_name)),
        interfaces: vec![],
        fields: vec![],
        methods: vec![],
        constructors: vec![method(access_flags::ACC_PUBLIC, "<init>", Type::Void, vec![])],
    }
}

fn interface_info(name: &str) -> ClassInfo {
    ClassInfo {
        access: access_flags::ACC_PUBLIC | access_flags::ACC_INTERFACE | access_flags::ACC_ABSTRACT,
        name: name.to_string(),
        super_class: None,
        interfaces: vec![],
        fields: vec![],
        methods: vec![],
        constructors: vec![],
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Rc<ResolutionContext>>> = const { RefCell::new(None) };
    static MEMO: RefCell<HashMap<String, Rc<ClassInfo>>> = RefCell::new(HashMap::new());
}

/// Install `context` as this thread's active context. The per-thread memo
/// cache is flushed: the same qualified name may denote a different class
/// under the new context.
pub fn install_context(context: Rc<ResolutionContext>) {
    ACTIVE.with(|active| {
        let mut active = active.borrow_mut();
        let changed = match active.as_ref() {
            Some(current) => !Rc::ptr_eq(current, &context),
            None => true,
        };
        if changed {
            MEMO.with(|memo| memo.borrow_mut().clear());
            log::debug!("resolution context switched to '{}'", context.name());
        }
        *active = Some(context);
    });
}

pub fn active_context() -> Option<Rc<ResolutionContext>> {
    ACTIVE.with(|active| active.borrow().clone())
}

/// Resolve through the active context with per-thread memoization.
pub fn resolve_active(name: &str) -> Result<Rc<ClassInfo>, ResolveError> {
    if let Some(hit) = MEMO.with(|memo| memo.borrow().get(name).cloned()) {
        return Ok(hit);
    }
    let context = active_context().ok_or(ResolveError::NoContext)?;
    let info = context.resolve(name)?;
    MEMO.with(|memo| memo.borrow_mut().insert(name.to_string(), Rc::clone(&info)));
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_walk_reaches_transitive_supertypes() {
        let context = ResolutionContext::new("test");
        assert!(context.is_subtype_of("java.lang.RuntimeException", THROWABLE_CLASS));
        assert!(context.is_subtype_of("java.lang.IllegalArgumentException", "java.lang.Exception"));
        assert!(!context.is_subtype_of(THROWABLE_CLASS, "java.lang.Exception"));
        assert!(!context.is_subtype_of(STRING_CLASS, STRING_CLASS));
    }

    #[test]
    fn memo_cache_is_invalidated_on_context_switch() {
        let first = Rc::new(ResolutionContext::new("first"));
        install_context(Rc::clone(&first));
        assert!(resolve_active(STRING_CLASS).is_ok());

        let mut other = ResolutionContext::empty("second");
        other.register(ClassInfo {
            access: access_flags::ACC_PUBLIC,
            name: "p.Only".to_string(),
            super_class: Some(Type::object()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            constructors: vec![],
        });
        install_context(Rc::new(other));
        assert!(resolve_active(STRING_CLASS).is_err());
        assert!(resolve_active("p.Only").is_ok());
    }

    #[test]
    fn imports_resolve_simple_names() {
        let mut context = ResolutionContext::new("test");
        context.register(ClassInfo {
            access: access_flags::ACC_PUBLIC,
            name: "com.example.Widget".to_string(),
            super_class: Some(Type::object()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            constructors: vec![],
        });
        let imports = vec!["com.example.Widget".to_string()];
        assert!(context.resolve_imported("Widget", &imports).is_ok());
        let wildcard = vec!["com.example.*".to_string()];
        assert!(context.resolve_imported("Widget", &wildcard).is_ok());
        assert!(context.resolve_imported("String", &[]).is_ok());
        assert!(context.resolve_imported("Missing", &imports).is_err());
    }
}
