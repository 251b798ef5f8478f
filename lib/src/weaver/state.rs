use crate::jvm::class_graph::ClassId;
use crate::jvm::{Name, RenderDescriptor, UnqualifiedName};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Structural summary of a type: whatever matching could depend on
///
/// Synthetic members and static initializers are left out since the weaver adds those itself.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TypeFingerprint {
    pub access_flags: u16,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: BTreeSet<String>,

    /// Fields and methods, as `flags name descriptor`
    pub members: BTreeSet<String>,
}

impl TypeFingerprint {
    pub fn of<'g>(class: ClassId<'g>) -> TypeFingerprint {
        let mut members = BTreeSet::new();
        for field in class.0.fields.iter() {
            if field
                .access_flags
                .contains(crate::jvm::FieldAccessFlags::SYNTHETIC)
            {
                continue;
            }
            members.insert(format!(
                "{:04x} {} {}",
                field.access_flags.bits(),
                field.name.as_str(),
                field.descriptor.render()
            ));
        }
        for method in class.0.methods.iter() {
            if method
                .access_flags
                .contains(crate::jvm::MethodAccessFlags::SYNTHETIC)
                || method.name == UnqualifiedName::CLINIT
            {
                continue;
            }
            members.insert(format!(
                "{:04x} {}{}",
                method.access_flags.bits(),
                method.name.as_str(),
                method.descriptor.render()
            ));
        }
        TypeFingerprint {
            access_flags: class.access_flags.bits(),
            superclass: class.superclass.map(|s| s.name.as_str().to_owned()),
            interfaces: class
                .interfaces
                .iter()
                .map(|i| i.name.as_str().to_owned())
                .collect(),
            annotations: class
                .annotations
                .iter()
                .map(|a| a.type_name.as_str().to_owned())
                .collect(),
            members,
        }
    }
}

/// What needs weaving again after some inputs changed
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Reweave {
    Nothing,
    Types(BTreeSet<String>),

    /// Aspects changed (or too much did), so every type has to be woven again
    Everything,
}

/// Incremental weaving state carried from one weave to the next
///
/// For every woven type this records the types its weaving depended on (its super types and the
/// aspects whose advice applied). Fingerprints are kept for woven types, their dependencies, and
/// aspects.
#[derive(Clone, Default, Debug)]
pub struct WeaverState {
    fingerprints: BTreeMap<String, TypeFingerprint>,

    /// Woven type to the types it depends on
    dependencies: BTreeMap<String, BTreeSet<String>>,

    /// Dependency to the woven types depending on it
    dependents: BTreeMap<String, BTreeSet<String>>,
    aspects: BTreeSet<String>,
}

impl WeaverState {
    pub fn new() -> WeaverState {
        WeaverState::default()
    }

    pub fn fingerprint(&self, class: &str) -> Option<&TypeFingerprint> {
        self.fingerprints.get(class)
    }

    pub fn woven_types(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn dependencies_of(&self, class: &str) -> impl Iterator<Item = &str> {
        self.dependencies
            .get(class)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Remember an aspect that was part of the weave
    pub fn record_aspect<'g>(&mut self, aspect: ClassId<'g>) {
        let name = aspect.name.as_str().to_owned();
        self.fingerprints
            .insert(name.clone(), TypeFingerprint::of(aspect));
        self.aspects.insert(name);
    }

    /// Remember a woven type along with what its weaving depended on
    ///
    /// Recording the same type again replaces what was known about it.
    pub fn record<'g>(
        &mut self,
        class: ClassId<'g>,
        dependencies: impl IntoIterator<Item = ClassId<'g>>,
    ) {
        let name = class.name.as_str().to_owned();
        self.forget(&name);

        let mut deps = BTreeSet::new();
        for dependency in dependencies {
            let dep_name = dependency.name.as_str().to_owned();
            if dep_name == name {
                continue;
            }
            self.fingerprints
                .insert(dep_name.clone(), TypeFingerprint::of(dependency));
            self.dependents
                .entry(dep_name.clone())
                .or_default()
                .insert(name.clone());
            deps.insert(dep_name);
        }
        self.fingerprints
            .insert(name.clone(), TypeFingerprint::of(class));
        self.dependencies.insert(name, deps);
    }

    fn forget(&mut self, class: &str) {
        if let Some(previous) = self.dependencies.remove(class) {
            for dep in previous {
                if let Some(dependents) = self.dependents.get_mut(&dep) {
                    dependents.remove(class);
                    if dependents.is_empty() {
                        self.dependents.remove(&dep);
                    }
                }
            }
        }
    }

    /// Work out which types need weaving again, given fingerprints of the current inputs and the
    /// names of the current aspects
    ///
    /// A type is rewoven if it is new, if it changed, or if anything it (transitively) depended
    /// on changed. Adding, removing, or changing an aspect means everything gets rewoven, as does
    /// a change reaching every previously woven type.
    pub fn changed_dependents(
        &self,
        current: &BTreeMap<String, TypeFingerprint>,
        current_aspects: &BTreeSet<String>,
    ) -> Reweave {
        if *current_aspects != self.aspects {
            return Reweave::Everything;
        }

        // Library types missing from `current` are assumed unchanged, woven ones are gone
        let changed = |name: &String| match (self.fingerprints.get(name), current.get(name)) {
            (Some(before), Some(now)) => before != now,
            (Some(_), None) => self.dependencies.contains_key(name) || self.aspects.contains(name),
            (None, _) => true,
        };

        if self.aspects.iter().any(changed) {
            return Reweave::Everything;
        }

        let mut roots: Vec<&String> = self.fingerprints.keys().filter(|n| changed(n)).collect();
        roots.extend(
            current
                .keys()
                .filter(|name| !self.fingerprints.contains_key(*name)),
        );

        let mut reweave: BTreeSet<String> = BTreeSet::new();
        let mut visited: BTreeSet<&String> = BTreeSet::new();
        let mut queue: VecDeque<&String> = roots.into_iter().collect();
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            if current.contains_key(name)
                && (self.dependencies.contains_key(name) || !self.fingerprints.contains_key(name))
            {
                reweave.insert(name.clone());
            }
            if let Some(dependents) = self.dependents.get(name) {
                queue.extend(dependents.iter());
            }
        }

        let previously_woven = self.dependencies.len();
        let rewoven_again = reweave
            .iter()
            .filter(|name| self.dependencies.contains_key(*name))
            .count();
        if previously_woven > 1 && rewoven_again == previously_woven {
            Reweave::Everything
        } else if reweave.is_empty() {
            Reweave::Nothing
        } else {
            Reweave::Types(reweave)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::{ClassData, ClassGraph, ClassGraphArenas, ClassOrigin, MethodData};
    use crate::jvm::{BinaryName, ClassAccessFlags, MethodAccessFlags, MethodDescriptor};

    fn add_class<'g>(graph: &ClassGraph<'g>, name: &str, superclass: ClassId<'g>) -> ClassId<'g> {
        graph.add_class(ClassData::new(
            BinaryName::from_string(name.to_owned()).unwrap(),
            ClassOrigin::Woven,
            Some(superclass),
            vec![],
            ClassAccessFlags::PUBLIC,
        ))
    }

    fn fingerprints<'g>(classes: &[ClassId<'g>]) -> BTreeMap<String, TypeFingerprint> {
        classes
            .iter()
            .map(|class| (class.name.as_str().to_owned(), TypeFingerprint::of(*class)))
            .collect()
    }

    #[test]
    fn synthetic_members_are_ignored() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = crate::jvm::class_graph::JavaLibrary::add_to_graph(&graph);
        let class = add_class(&graph, "a/A", java.object);
        let before = TypeFingerprint::of(class);

        graph.add_method(MethodData {
            class,
            name: UnqualifiedName::CLINIT,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags: MethodAccessFlags::STATIC,
            annotations: vec![],
        });
        assert_eq!(TypeFingerprint::of(class), before);

        graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags: MethodAccessFlags::PUBLIC,
            annotations: vec![],
        });
        let after = TypeFingerprint::of(class);
        assert_ne!(after, before);
        assert!(after.members.contains("0001 run()V"));
    }

    #[test]
    fn dependents_of_changes_are_rewoven() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = crate::jvm::class_graph::JavaLibrary::add_to_graph(&graph);
        let base = add_class(&graph, "a/Base", java.object);
        let derived = add_class(&graph, "a/Derived", base);
        let other = add_class(&graph, "a/Other", java.object);
        let unrelated = add_class(&graph, "a/Unrelated", java.object);

        let mut state = WeaverState::new();
        state.record(base, base.all_supertypes());
        state.record(derived, derived.all_supertypes());
        state.record(other, other.all_supertypes());
        state.record(unrelated, unrelated.all_supertypes());

        let aspects = BTreeSet::new();
        let mut current = fingerprints(&[base, derived, other, unrelated]);
        assert_eq!(state.changed_dependents(&current, &aspects), Reweave::Nothing);

        current
            .get_mut("a/Base")
            .unwrap()
            .members
            .insert(String::from("0001 extra()V"));
        let expected: BTreeSet<String> = ["a/Base", "a/Derived"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            state.changed_dependents(&current, &aspects),
            Reweave::Types(expected)
        );

        // New types get woven too
        let mut current = fingerprints(&[base, derived, other, unrelated]);
        current.insert(
            String::from("a/New"),
            TypeFingerprint::of(add_class(&graph, "a/New", java.object)),
        );
        let expected: BTreeSet<String> = ["a/New"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            state.changed_dependents(&current, &aspects),
            Reweave::Types(expected)
        );

        // Changing the root of everything touches every woven type
        let mut current = fingerprints(&[base, derived, other, unrelated]);
        current.insert(
            String::from("java/lang/Object"),
            TypeFingerprint {
                access_flags: 0,
                superclass: None,
                interfaces: vec![],
                annotations: BTreeSet::new(),
                members: BTreeSet::new(),
            },
        );
        assert_eq!(state.changed_dependents(&current, &aspects), Reweave::Everything);
    }

    #[test]
    fn aspect_changes_reweave_everything() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = crate::jvm::class_graph::JavaLibrary::add_to_graph(&graph);
        let target = add_class(&graph, "a/Target", java.object);
        let aspect = add_class(&graph, "a/Tracing", java.object);

        let mut state = WeaverState::new();
        state.record_aspect(aspect);
        state.record(target, vec![target, aspect]);
        assert_eq!(state.dependencies_of("a/Target").collect::<Vec<_>>(), vec!["a/Tracing"]);

        let aspects: BTreeSet<String> = std::iter::once(String::from("a/Tracing")).collect();
        let mut current = fingerprints(&[target, aspect]);
        assert_eq!(state.changed_dependents(&current, &aspects), Reweave::Nothing);

        current.get_mut("a/Tracing").unwrap().access_flags = 0;
        assert_eq!(state.changed_dependents(&current, &aspects), Reweave::Everything);

        current.remove("a/Tracing");
        assert_eq!(state.changed_dependents(&current, &aspects), Reweave::Everything);
    }

    #[test]
    fn new_and_dropped_aspects_reweave_everything() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = crate::jvm::class_graph::JavaLibrary::add_to_graph(&graph);
        let target = add_class(&graph, "a/Target", java.object);
        let tracing = add_class(&graph, "a/Tracing", java.object);
        let security = add_class(&graph, "a/Security", java.object);

        let mut state = WeaverState::new();
        state.record_aspect(tracing);
        state.record(target, vec![target, tracing]);

        let current = fingerprints(&[target, tracing, security]);
        let added: BTreeSet<String> = ["a/Tracing", "a/Security"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(state.changed_dependents(&current, &added), Reweave::Everything);

        // Dropping the only aspect, while its class is still around
        let current = fingerprints(&[target, tracing]);
        assert_eq!(
            state.changed_dependents(&current, &BTreeSet::new()),
            Reweave::Everything
        );
    }
}
