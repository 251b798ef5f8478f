use crate::jvm::class_graph::{ClassGraph, ClassId, JavaLibrary, MethodId};
use crate::jvm::model::{Class, Field, InstructionEdit};
use crate::jvm::{BinaryName, Name};
use crate::weaver::advice::{fallback_order, AdviceAction, AdviceMatch, PrecedenceRules};
use crate::weaver::declarations::{member_location, Aspect, ResolvedAspects};
use crate::weaver::shadow::{find_shadows, Shadow, ShadowKind, ShadowPosition};
use crate::weaver::splice::{Applied, Splicer};
use crate::weaver::state::{Reweave, TypeFingerprint, WeaverState};
use crate::weaver::{sort_by_precedence, Diagnostic, Error, Settings, SourceLocation};
use log::{debug, error, trace, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Steps a type goes through while being woven
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WeaveStage {
    /// Finding shadows and matching advice against them
    Collecting,

    /// Sorting advice at each shadow by precedence
    Ordering,

    /// Computing and applying edits
    Splicing,
    Done,
}

impl fmt::Display for WeaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeaveStage::Collecting => "collecting",
            WeaveStage::Ordering => "ordering",
            WeaveStage::Splicing => "splicing",
            WeaveStage::Done => "done",
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// Advice was spliced in
    Woven,

    /// No advice applies anywhere in the type
    Unchanged,

    /// Nothing the type depends on changed since the previous weave, so it was left alone
    UpToDate,

    /// Weaving failed and every change was discarded (see the diagnostics)
    Failed,
}

pub struct WovenType<'g> {
    pub class: Class<'g>,
    pub outcome: Outcome,
}

pub struct WeaveOutput<'g> {
    /// Types in the order they were passed in
    pub types: Vec<WovenType<'g>>,
    pub diagnostics: Vec<Diagnostic>,

    /// State to pass to the next incremental weave
    pub state: WeaverState,
}

/// Weave aspects into a batch of types
///
/// Declarations that can't be resolved are dropped, and types that can't be woven come back as
/// they were read: both are reported in the diagnostics. With [`Settings::incremental`] and the
/// state of a previous weave, only types affected by a change are woven.
pub fn weave<'g>(
    class_graph: &ClassGraph<'g>,
    java: &JavaLibrary<'g>,
    settings: &Settings,
    types: Vec<Class<'g>>,
    aspects: &[Aspect<'g>],
    previous: Option<&WeaverState>,
) -> WeaveOutput<'g> {
    let reweave = match previous {
        Some(previous) if settings.incremental => {
            let current: BTreeMap<String, TypeFingerprint> = types
                .iter()
                .map(|class| class.id)
                .chain(aspects.iter().map(|aspect| aspect.class))
                .map(|class| (class.name.as_str().to_owned(), TypeFingerprint::of(class)))
                .collect();
            let current_aspects: BTreeSet<String> = aspects
                .iter()
                .map(|aspect| aspect.class.name.as_str().to_owned())
                .collect();
            previous.changed_dependents(&current, &current_aspects)
        }
        _ => Reweave::Everything,
    };
    debug!("Reweaving {:?}", reweave);

    let mut weaver = Weaver::new(class_graph, java, settings, aspects);
    let mut woven = Vec::with_capacity(types.len());
    for class in types {
        let up_to_date = match &reweave {
            Reweave::Nothing => true,
            Reweave::Types(names) => !names.contains(class.id.name.as_str()),
            Reweave::Everything => false,
        };
        match previous {
            Some(previous) if up_to_date => {
                weaver.carry_over(class.id, previous);
                woven.push(WovenType {
                    class,
                    outcome: Outcome::UpToDate,
                });
            }
            _ => woven.push(weaver.weave_type(class)),
        }
    }

    let (diagnostics, state) = weaver.finish();
    WeaveOutput {
        types: woven,
        diagnostics,
        state,
    }
}

/// Why a type couldn't be woven, and where
struct Failure {
    error: Error,
    location: SourceLocation,
}

trait At<T> {
    fn at(self, location: &SourceLocation) -> Result<T, Failure>;
}

impl<T, E: Into<Error>> At<T> for Result<T, E> {
    fn at(self, location: &SourceLocation) -> Result<T, Failure> {
        self.map_err(|error| Failure {
            error: error.into(),
            location: location.clone(),
        })
    }
}

/// Advice matching one shadow, sorted lowest precedence first
struct ShadowMatches<'g> {
    shadow: usize,
    matches: Vec<AdviceMatch<'g>>,
}

/// Weaves types one at a time against a fixed set of aspects
pub struct Weaver<'a, 'g> {
    class_graph: &'a ClassGraph<'g>,
    java: &'a JavaLibrary<'g>,
    settings: &'a Settings,
    resolved: ResolvedAspects<'g>,

    /// Whether each piece of advice applied anywhere
    applied: Vec<bool>,

    /// Whether some type was skipped because it was up to date
    skipped: bool,
    diagnostics: Vec<Diagnostic>,
    state: WeaverState,
}

impl<'a, 'g> Weaver<'a, 'g> {
    /// Resolve the aspects
    ///
    /// Problems with their declarations go straight into the diagnostics.
    pub fn new(
        class_graph: &'a ClassGraph<'g>,
        java: &'a JavaLibrary<'g>,
        settings: &'a Settings,
        aspects: &[Aspect<'g>],
    ) -> Weaver<'a, 'g> {
        let mut diagnostics = vec![];
        let resolved =
            ResolvedAspects::resolve(class_graph, java, settings, aspects, &mut diagnostics);
        let mut state = WeaverState::new();
        for aspect in aspects {
            state.record_aspect(aspect.class);
        }
        debug!(
            "Weaving with {} advice from {} aspects",
            resolved.advice.len(),
            aspects.len()
        );
        Weaver {
            class_graph,
            java,
            settings,
            applied: vec![false; resolved.advice.len()],
            resolved,
            skipped: false,
            diagnostics,
            state,
        }
    }

    /// Weave one type
    ///
    /// This never fails: if anything goes wrong, the type is returned exactly as it was passed
    /// in and the problem is reported in the diagnostics.
    pub fn weave_type(&mut self, mut class: Class<'g>) -> WovenType<'g> {
        let checkpoint = class.checkpoint();
        match self.try_weave(&mut class) {
            Ok(dependencies) => {
                self.state.record(class.id, dependencies);
                let outcome = if class.is_edited() {
                    Outcome::Woven
                } else {
                    Outcome::Unchanged
                };
                debug!("{}: {}", class.id.name.as_str(), WeaveStage::Done);
                WovenType { class, outcome }
            }
            Err(Failure { error, location }) => {
                match &error {
                    Error::Internal(_) | Error::Jvm(_) => {
                        error!("Failed to weave {} at {}: {}", class.id.name.as_str(), location, error)
                    }
                    _ => warn!("Not weaving {}: {}", class.id.name.as_str(), error),
                }
                self.diagnostics
                    .push(Diagnostic::error(error.to_string(), location));
                class.restore(checkpoint);
                WovenType {
                    class,
                    outcome: Outcome::Failed,
                }
            }
        }
    }

    /// Keep what a previous weave knew about a type that is up to date
    fn carry_over(&mut self, class: ClassId<'g>, previous: &WeaverState) {
        let dependencies: Vec<ClassId<'g>> = previous
            .dependencies_of(class.name.as_str())
            .filter_map(|name| BinaryName::from_string(name.to_owned()).ok())
            .filter_map(|name| self.class_graph.lookup_class(&name))
            .collect();
        self.state.record(class, dependencies);
        self.skipped = true;
    }

    /// Final diagnostics (including lints) and the state for the next weave
    pub fn finish(mut self) -> (Vec<Diagnostic>, WeaverState) {
        if self.settings.lint && !self.skipped {
            for (advice, applied) in self.resolved.advice.iter().zip(&self.applied) {
                if *applied {
                    continue;
                }
                if let AdviceAction::Invoke { method, .. } = &advice.action {
                    self.diagnostics.push(Diagnostic::lint(
                        format!("{} has not been applied", advice.describe()),
                        member_location(*method),
                    ));
                }
            }
        }
        (self.diagnostics, self.state)
    }

    /// Match, order, and splice, returning the types the result depends on
    fn try_weave(&mut self, class: &mut Class<'g>) -> Result<Vec<ClassId<'g>>, Failure> {
        let name = class.id.name.as_str().to_owned();
        let class_location = SourceLocation {
            source_file: class.source_file.clone(),
            ..SourceLocation::class(name.as_str())
        };

        debug!("{}: {}", name, WeaveStage::Collecting);
        let shadows = find_shadows(class, self.class_graph, self.java);
        let mut collected: Vec<ShadowMatches<'g>> = vec![];
        for (index, shadow) in shadows.iter().enumerate() {
            let mut matches = vec![];
            for (advice_index, advice) in self.resolved.advice.iter().enumerate() {
                let matched = advice
                    .match_shadow(advice_index, shadow, self.class_graph, self.java)
                    .at(&shadow.location)?;
                if let Some(matched) = matched {
                    trace!(
                        "{} at {}: {:?} {}",
                        advice.describe(),
                        shadow,
                        matched.value,
                        matched.test
                    );
                    matches.push(matched);
                }
            }
            if !matches.is_empty() {
                collected.push(ShadowMatches {
                    shadow: index,
                    matches,
                });
            }
        }

        debug!(
            "{}: {} ({} of {} shadows matched)",
            name,
            WeaveStage::Ordering,
            collected.len(),
            shadows.len()
        );
        let rules = PrecedenceRules {
            declared: &self.resolved.precedence,
        };
        let advice = &self.resolved.advice;
        for entry in &mut collected {
            let order = sort_by_precedence(
                &entry.matches,
                |a, b| rules.compare(&advice[a.advice], &advice[b.advice]),
                |a, b| fallback_order(&advice[a.advice], &advice[b.advice]),
            )
            .map_err(|cycle| Failure {
                error: Error::CircularPrecedence(
                    cycle
                        .members
                        .iter()
                        .map(|member| advice[entry.matches[*member].advice].describe())
                        .collect(),
                ),
                location: shadows[entry.shadow].location.clone(),
            })?;
            let mut matches: Vec<Option<AdviceMatch<'g>>> =
                entry.matches.drain(..).map(Some).collect();
            entry.matches = order
                .into_iter()
                .filter_map(|index| matches[index].take())
                .collect();
        }

        debug!("{}: {}", name, WeaveStage::Splicing);

        // Enclosing shadows go first, and handlers before the instructions following them, so
        // that insertions sharing a position nest properly
        collected.sort_by_key(|entry| match shadows[entry.shadow].kind {
            kind if kind.is_enclosing() => 0,
            ShadowKind::ExceptionHandler => 1,
            _ => 2,
        });

        let mut edits: Vec<(MethodId<'g>, Vec<InstructionEdit>)> = vec![];
        let counters: Vec<_> = self.resolved.counters.on(class.id).collect();
        if !counters.is_empty() {
            let splicer = Splicer::new(self.class_graph, self.java);
            for counter in &counters {
                class.add_field(Field::new(*counter)).at(&class_location)?;
            }
            let clinit = class.static_initializer(self.class_graph).id;
            edits.push((
                clinit,
                vec![InstructionEdit::Insert {
                    position: 0,
                    items: splicer.counter_initializers(&counters),
                }],
            ));
        }

        // Only reported if the whole type weaves
        let mut lints = vec![];
        let mut dependencies = class.id.all_supertypes();
        for entry in &collected {
            let shadow = &shadows[entry.shadow];
            let (method, position) = self.shadow_method(class, shadow)?;
            let method_edits = match edits.iter().position(|(m, _)| *m == method) {
                Some(index) => &mut edits[index].1,
                None => {
                    edits.push((method, vec![]));
                    let last = edits.len() - 1;
                    &mut edits[last].1
                }
            };
            let applied: Vec<Applied<'_, 'g>> = entry
                .matches
                .iter()
                .map(|matched| Applied {
                    advice: &self.resolved.advice[matched.advice],
                    matched,
                })
                .collect();
            let code = class
                .method_mut(method)
                .ok_or_else(|| vanished(shadow))
                .at(&shadow.location)?
                .code_mut()
                .at(&shadow.location)?;
            Splicer::new(self.class_graph, self.java)
                .splice(
                    code,
                    shadow,
                    position,
                    &applied,
                    method_edits,
                    &mut lints,
                )
                .at(&shadow.location)?;

            for matched in &entry.matches {
                let aspect = self.resolved.advice[matched.advice].aspect;
                if !dependencies.contains(&aspect) {
                    dependencies.push(aspect);
                }
            }
        }

        for (method, method_edits) in edits {
            let location = member_location(method);
            trace!("{} edits to {}", method_edits.len(), location);
            class
                .method_mut(method)
                .ok_or_else(|| Error::Internal(format!("{} has no method {:?}", name, method)))
                .at(&location)?
                .patch(method_edits)
                .at(&location)?;
        }
        if class.is_edited() {
            class
                .check_version(self.settings.output_version)
                .at(&class_location)?;
        }
        for entry in &collected {
            for matched in &entry.matches {
                self.applied[matched.advice] = true;
            }
        }
        self.diagnostics.extend(lints);
        Ok(dependencies)
    }

    /// Method whose body holds the shadow, and the position of the shadow in that body
    fn shadow_method(
        &self,
        class: &mut Class<'g>,
        shadow: &Shadow<'g>,
    ) -> Result<(MethodId<'g>, ShadowPosition), Failure> {
        match (shadow.position, shadow.enclosing_method) {
            (ShadowPosition::NoInitializer, _) => {
                let clinit = class.static_initializer(self.class_graph).id;
                Ok((clinit, ShadowPosition::Body { start: 0 }))
            }
            (position, Some(method)) if class.method(method).is_some() => Ok((method, position)),
            _ => Err(vanished(shadow)).at(&shadow.location),
        }
    }
}

fn vanished(shadow: &Shadow<'_>) -> Error {
    Error::Internal(format!("the method holding {} has vanished", shadow))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ClassFile, Constant, ConstantsPool, Member, Version};
    use crate::jvm::class_graph::{ClassData, ClassGraphArenas, ClassOrigin, MethodData};
    use crate::jvm::code::{BranchInstruction, Code, CodeItem, Instruction, InvokeType};
    use crate::jvm::{ClassAccessFlags, MethodAccessFlags, MethodDescriptor, RefType, UnqualifiedName};
    use crate::weaver::syntax::{parse_pointcut, parse_type_patterns};
    use crate::weaver::{AdviceDeclaration, AdviceKind, Severity};

    fn binary_name(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn void_method<'g>(
        graph: &ClassGraph<'g>,
        class: ClassId<'g>,
        name: &str,
        access_flags: MethodAccessFlags,
    ) -> MethodId<'g> {
        graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_string(name.to_owned()).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags,
            annotations: vec![],
        })
    }

    fn library_class<'g>(graph: &ClassGraph<'g>, java: &JavaLibrary<'g>, name: &str) -> ClassId<'g> {
        graph.add_class(ClassData::new(
            binary_name(name),
            ClassOrigin::Library,
            Some(java.object),
            vec![],
            ClassAccessFlags::PUBLIC,
        ))
    }

    /// `app/Main` with a static `run()V` whose body calls `app/Service.work()V`
    fn main_class<'g>(graph: &ClassGraph<'g>, work: MethodId<'g>) -> Class<'g> {
        Class::read(graph, main_class_file(work)).unwrap()
    }

    fn main_class_file(work: MethodId<'_>) -> ClassFile {
        let mut constants = ConstantsPool::new();
        let this_class = constants
            .intern_class_ref(&RefType::Object(binary_name("app/Main")))
            .unwrap();
        let super_class = constants
            .intern_class_ref(&RefType::Object(BinaryName::OBJECT))
            .unwrap();
        let mut code = Code::new(0);
        code.items.push(CodeItem::Instruction(Instruction::Invoke(
            InvokeType::Static,
            work.as_ref(),
        )));
        code.items.push(CodeItem::Branch(BranchInstruction::Return));
        let code = code.encode(&mut constants).unwrap();
        let code = constants.get_attribute(code).unwrap();
        let run = Member {
            access_flags: (MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC).bits(),
            name_index: constants.get_utf8("run").unwrap(),
            descriptor_index: constants.get_utf8("()V").unwrap(),
            attributes: vec![code],
        };
        ClassFile {
            version: Version::JAVA5,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![run],
            attributes: vec![],
        }
    }

    /// Aspect with one static `before` advice method per pointcut
    fn before_aspect<'g>(
        graph: &ClassGraph<'g>,
        java: &JavaLibrary<'g>,
        name: &str,
        pointcuts: &[(&str, &str)],
    ) -> Aspect<'g> {
        let class = library_class(graph, java, name);
        let advice = pointcuts
            .iter()
            .map(|(method, pointcut)| AdviceDeclaration {
                kind: AdviceKind::Before,
                method: void_method(
                    graph,
                    class,
                    method,
                    MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                ),
                arg_names: vec![],
                pointcut: parse_pointcut(pointcut).unwrap(),
                returning: None,
                throwing: None,
            })
            .collect();
        Aspect {
            class,
            pointcuts: vec![],
            advice,
            precedence: vec![],
        }
    }

    fn run_body<'g>(class: &Class<'g>) -> Vec<CodeItem> {
        class.methods[0].code_impl.as_ref().unwrap().items.clone()
    }

    fn invoke(method: MethodId<'_>) -> CodeItem {
        CodeItem::Instruction(Instruction::Invoke(InvokeType::Static, method.as_ref()))
    }

    #[test]
    fn splice_before_call() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let service = library_class(&graph, &java, "app/Service");
        let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);
        let main = main_class(&graph, work);
        let tracing = before_aspect(
            &graph,
            &java,
            "app/Tracing",
            &[
                ("log", "call(* app.Service.work()) && within(app.Main)"),
                ("never", "call(* app.Service.rest())"),
            ],
        );
        let log = tracing.advice[0].method;

        let settings = Settings::default();
        let output = weave(&graph, &java, &settings, vec![main], &[tracing], None);
        assert_eq!(output.types.len(), 1);
        assert_eq!(output.types[0].outcome, Outcome::Woven);
        assert_eq!(
            run_body(&output.types[0].class),
            vec![
                invoke(log),
                invoke(work),
                CodeItem::Branch(BranchInstruction::Return),
            ]
        );

        // Only the advice that never matched is worth mentioning
        assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
        assert_eq!(output.diagnostics[0].severity, Severity::Lint);
        assert!(output.diagnostics[0].message.contains("never"));

        let dependencies: Vec<&str> = output.state.dependencies_of("app/Main").collect();
        assert_eq!(dependencies, vec!["app/Tracing", "java/lang/Object"]);
    }

    #[test]
    fn circular_precedence_discards_the_type() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let service = library_class(&graph, &java, "app/Service");
        let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);
        let main = main_class(&graph, work);

        let pointcut = [("advise", "call(* app.Service.work())")];
        let mut a = before_aspect(&graph, &java, "app/A", &pointcut);
        let b = before_aspect(&graph, &java, "app/B", &pointcut);
        let c = before_aspect(&graph, &java, "app/C", &pointcut);
        a.precedence = vec![
            parse_type_patterns("app.A, app.B").unwrap(),
            parse_type_patterns("app.B, app.C").unwrap(),
            parse_type_patterns("app.C, app.A").unwrap(),
        ];

        let settings = Settings {
            lint: false,
            ..Settings::default()
        };
        let output = weave(&graph, &java, &settings, vec![main], &[a, b, c], None);
        assert_eq!(output.types[0].outcome, Outcome::Failed);
        assert!(!output.types[0].class.is_edited());
        assert_eq!(
            run_body(&output.types[0].class),
            vec![invoke(work), CodeItem::Branch(BranchInstruction::Return)]
        );

        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(diagnostic.severity, Severity::Error);
        assert!(diagnostic.message.starts_with("circular advice precedence"));
        for aspect in &["app.A", "app.B", "app.C"] {
            assert!(diagnostic.message.contains(aspect), "{}", diagnostic.message);
        }
        assert_eq!(diagnostic.location.class.as_deref(), Some("app/Main"));
        assert_eq!(diagnostic.location.member.as_deref(), Some("run()V"));
        assert!(output.state.woven_types().next().is_none());
    }

    #[test]
    fn contradictory_precedence_lists_discard_the_type() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let service = library_class(&graph, &java, "app/Service");
        let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);
        let main = main_class(&graph, work);

        let pointcut = [("advise", "call(* app.Service.work())")];
        let mut a = before_aspect(&graph, &java, "app/A", &pointcut);
        let mut b = before_aspect(&graph, &java, "app/B", &pointcut);
        a.precedence = vec![parse_type_patterns("app.A, app.B").unwrap()];
        b.precedence = vec![parse_type_patterns("app.B, app.A").unwrap()];

        let settings = Settings {
            lint: false,
            ..Settings::default()
        };
        let output = weave(&graph, &java, &settings, vec![main], &[a, b], None);
        assert_eq!(output.types[0].outcome, Outcome::Failed);
        assert!(!output.types[0].class.is_edited());
        assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(diagnostic.severity, Severity::Error);
        assert!(diagnostic.message.starts_with("circular advice precedence"));
        for aspect in &["app.A", "app.B"] {
            assert!(diagnostic.message.contains(aspect), "{}", diagnostic.message);
        }
    }

    /// `app/Guarded` whose static `run()V` catches `Throwable` around a call to `work`, with every
    /// local variable slot already taken
    fn guarded_class<'g>(graph: &ClassGraph<'g>, work: MethodId<'g>) -> Class<'g> {
        let mut constants = ConstantsPool::new();
        let this_class = constants
            .intern_class_ref(&RefType::Object(binary_name("app/Guarded")))
            .unwrap();
        let super_class = constants
            .intern_class_ref(&RefType::Object(BinaryName::OBJECT))
            .unwrap();
        let mut code = Code::new(u16::MAX);
        let start = code.fresh_label();
        let end = code.fresh_label();
        let handler = code.fresh_label();
        code.items = vec![
            CodeItem::Label(start),
            CodeItem::Instruction(Instruction::Invoke(InvokeType::Static, work.as_ref())),
            CodeItem::Label(end),
            CodeItem::Branch(BranchInstruction::Return),
            CodeItem::Label(handler),
            CodeItem::Instruction(Instruction::Pop),
            CodeItem::Branch(BranchInstruction::Return),
        ];
        code.exception_table.push(crate::jvm::code::ExceptionHandler {
            start,
            end,
            handler,
            catch_type: Some(binary_name("java/lang/Throwable")),
        });
        let code = code.encode(&mut constants).unwrap();
        let code = constants.get_attribute(code).unwrap();
        let run = Member {
            access_flags: (MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC).bits(),
            name_index: constants.get_utf8("run").unwrap(),
            descriptor_index: constants.get_utf8("()V").unwrap(),
            attributes: vec![code],
        };
        let file = ClassFile {
            version: Version::JAVA5,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![run],
            attributes: vec![],
        };
        Class::read(graph, file).unwrap()
    }

    #[test]
    fn failed_types_report_no_splicing_lints() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let service = library_class(&graph, &java, "app/Service");
        let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);
        let guarded = guarded_class(&graph, work);

        // The `after` advice is skipped with a lint, then the `before` advice runs out of locals
        let mut handling = before_aspect(
            &graph,
            &java,
            "app/Handling",
            &[("before", "handler(java.lang.Throwable)")],
        );
        handling.advice.push(AdviceDeclaration {
            kind: AdviceKind::After,
            method: void_method(
                &graph,
                handling.class,
                "after",
                MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            ),
            arg_names: vec![],
            pointcut: parse_pointcut("handler(java.lang.Throwable)").unwrap(),
            returning: None,
            throwing: None,
        });

        let settings = Settings {
            lint: false,
            ..Settings::default()
        };
        let output = weave(&graph, &java, &settings, vec![guarded], &[handling], None);
        assert_eq!(output.types[0].outcome, Outcome::Failed);
        assert!(!output.types[0].class.is_edited());
        assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
        assert_eq!(output.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn woven_types_must_fit_the_output_version() {
        for pointcut in &["call(* app.Service.work())", "call(* app.Service.rest())"] {
            let arenas = ClassGraphArenas::new();
            let graph = ClassGraph::new(&arenas);
            let java = JavaLibrary::add_to_graph(&graph);
            let service = library_class(&graph, &java, "app/Service");
            let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);

            // A Java 8 class using a method type constant
            let mut file = main_class_file(work);
            file.version = Version::JAVA8;
            let descriptor = file.constants.get_utf8("()V").unwrap();
            let mut constants = file.constants.into_offset_vec();
            constants.push(Constant::MethodType { descriptor });
            file.constants = ConstantsPool::from_constants(&constants);
            let main = Class::read(&graph, file).unwrap();

            let tracing = before_aspect(&graph, &java, "app/Tracing", &[("log", *pointcut)]);
            let settings = Settings {
                lint: false,
                ..Settings::default()
            };
            let output = weave(&graph, &java, &settings, vec![main], &[tracing], None);
            let woven = &output.types[0];
            assert!(!woven.class.is_edited());
            assert_eq!(woven.class.original_version(), Version::JAVA8);
            if pointcut.contains("work") {
                assert_eq!(woven.outcome, Outcome::Failed);
                assert_eq!(output.diagnostics.len(), 1, "{:?}", output.diagnostics);
                assert_eq!(output.diagnostics[0].severity, Severity::Error);
                assert!(output.diagnostics[0]
                    .message
                    .contains("cannot be written at this version"));
            } else {
                assert_eq!(woven.outcome, Outcome::Unchanged);
                assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
            }
        }
    }

    #[test]
    fn unresolved_declarations_are_skipped() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let service = library_class(&graph, &java, "app/Service");
        let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);
        let main = main_class(&graph, work);
        let tracing = before_aspect(
            &graph,
            &java,
            "app/Tracing",
            &[("broken", "missing()"), ("log", "call(* app.Service.work())")],
        );
        let log = tracing.advice[1].method;

        let output = weave(&graph, &java, &Settings::default(), vec![main], &[tracing], None);
        assert_eq!(output.types[0].outcome, Outcome::Woven);
        assert_eq!(run_body(&output.types[0].class)[0], invoke(log));
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].severity, Severity::Error);
        assert!(output.diagnostics[0].message.contains("missing"));
        assert_eq!(
            output.diagnostics[0].location.member.as_deref(),
            Some("broken()V")
        );
    }

    /// Weave `app/Main` in a fresh class graph, with `extra` adding a method to the aspect and
    /// `security` adding a second aspect
    fn weave_fresh(
        extra: bool,
        security: bool,
        previous: Option<&WeaverState>,
    ) -> (Outcome, WeaverState) {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let service = library_class(&graph, &java, "app/Service");
        let work = void_method(&graph, service, "work", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC);
        let tracing = before_aspect(&graph, &java, "app/Tracing", &[("log", "call(* app.Service.work())")]);
        if extra {
            void_method(&graph, tracing.class, "extra", MethodAccessFlags::PUBLIC);
        }
        let mut aspects = vec![tracing];
        if security {
            aspects.push(before_aspect(
                &graph,
                &java,
                "app/Security",
                &[("check", "call(* app.Service.rest())")],
            ));
        }
        let settings = Settings {
            incremental: true,
            lint: false,
            ..Settings::default()
        };
        let output = weave(
            &graph,
            &java,
            &settings,
            vec![main_class(&graph, work)],
            &aspects,
            previous,
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let outcome = output.types[0].outcome;
        assert_eq!(outcome == Outcome::UpToDate, !output.types[0].class.is_edited());
        (outcome, output.state)
    }

    #[test]
    fn incremental_weave_skips_unaffected_types() {
        let (outcome, first) = weave_fresh(false, false, None);
        assert_eq!(outcome, Outcome::Woven);

        // Reading the same classes again changes nothing
        let (outcome, second) = weave_fresh(false, false, Some(&first));
        assert_eq!(outcome, Outcome::UpToDate);
        assert_eq!(
            second.dependencies_of("app/Main").collect::<Vec<_>>(),
            vec!["app/Tracing", "java/lang/Object"]
        );

        // A change to the aspect means weaving everything again
        let (outcome, _) = weave_fresh(true, false, Some(&second));
        assert_eq!(outcome, Outcome::Woven);
    }

    #[test]
    fn incremental_weave_picks_up_new_aspects() {
        let (_, first) = weave_fresh(false, false, None);
        let (outcome, second) = weave_fresh(false, true, Some(&first));
        assert_eq!(outcome, Outcome::Woven);

        // And notices when one goes away
        let (outcome, third) = weave_fresh(false, true, Some(&second));
        assert_eq!(outcome, Outcome::UpToDate);
        let (outcome, _) = weave_fresh(false, false, Some(&third));
        assert_eq!(outcome, Outcome::Woven);
    }

    #[test]
    fn stage_names() {
        let stages = [
            WeaveStage::Collecting,
            WeaveStage::Ordering,
            WeaveStage::Splicing,
            WeaveStage::Done,
        ];
        let names: Vec<String> = stages.iter().map(|stage| stage.to_string()).collect();
        assert_eq!(names, vec!["collecting", "ordering", "splicing", "done"]);
    }
}
