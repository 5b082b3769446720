//! Entry points for encoding and decoding whole graphs.

use std::sync::Arc;

use bincode::error::DecodeError;
use keel_diagnostics::DiagnosticSink;

use crate::bindings::CodecBindings;
use crate::context::{ReadContext, WriteContext};
use crate::environment::{DecodeEnvironment, Environment};
use crate::error::CodecResult;
use crate::isolate::{IsolateContext, IsolateOwner};
use crate::problems::ProblemReporter;
use crate::resolver::EncodingResolver;
use crate::value::Value;

pub use keel_common::DEFAULT_MAX_PROBLEMS;

/// Tuning knobs for a [`GraphCodec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecOptions {
    /// Problems a pass may report before it fails with
    /// [`CodecError::TooManyProblems`](crate::CodecError::TooManyProblems).
    pub max_problems: usize,
    /// Emit a `trace` event for every frame entered.
    pub trace_frames: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_problems: DEFAULT_MAX_PROBLEMS,
            trace_frames: false,
        }
    }
}

/// The output of an encode pass.
#[derive(Clone, Debug)]
pub struct EncodedGraph {
    /// The encoded stream.
    pub bytes: Vec<u8>,
    /// Class and service tables the stream's tokens index into.
    pub environment: Environment,
    /// Distinct beans written.
    pub beans: usize,
    /// Non-fatal problems reported while encoding.
    pub problems: usize,
}

/// Encodes and decodes object graphs, sharing one [`EncodingResolver`]
/// across passes.
#[derive(Clone, Default)]
pub struct GraphCodec {
    resolver: Arc<EncodingResolver>,
    bindings: Arc<CodecBindings>,
    options: CodecOptions,
}

impl GraphCodec {
    /// Creates a codec with its own resolver.
    pub fn new(options: CodecOptions) -> Self {
        Self::with_resolver(Arc::new(EncodingResolver::new()), options)
    }

    /// Creates a codec sharing an existing resolver.
    pub fn with_resolver(resolver: Arc<EncodingResolver>, options: CodecOptions) -> Self {
        Self {
            resolver,
            bindings: Arc::default(),
            options,
        }
    }

    /// Replaces the per-type codec bindings consulted before the resolver.
    pub fn with_bindings(mut self, bindings: CodecBindings) -> Self {
        self.bindings = Arc::new(bindings);
        self
    }

    /// The per-type codec bindings.
    pub fn bindings(&self) -> &CodecBindings {
        &self.bindings
    }

    /// The shared resolver.
    pub fn resolver(&self) -> &Arc<EncodingResolver> {
        &self.resolver
    }

    /// The codec's options.
    pub fn options(&self) -> CodecOptions {
        self.options
    }

    /// Encodes the graph reachable from `root` with `owner` as the active
    /// isolate. Non-fatal problems go to `sink`.
    pub fn encode(
        &self,
        root: &Value,
        owner: Arc<dyn IsolateOwner>,
        sink: &Arc<DiagnosticSink>,
    ) -> CodecResult<EncodedGraph> {
        let mut ctx = WriteContext::new(
            Arc::clone(&self.resolver),
            ProblemReporter::new(Arc::clone(sink), self.options.max_problems),
            self.options.trace_frames,
        )
        .with_bindings(Arc::clone(&self.bindings));
        ctx.with_isolate(owner, |ctx| ctx.write_value(root))?;
        let encoded = ctx.finish();
        tracing::debug!(
            bytes = encoded.bytes.len(),
            beans = encoded.beans,
            classes = encoded.environment.classes.len(),
            services = encoded.environment.services.len(),
            problems = encoded.problems,
            "encoded graph"
        );
        Ok(encoded)
    }

    /// Decodes a graph previously produced by [`encode`](Self::encode).
    pub fn decode(
        &self,
        bytes: &[u8],
        env: &DecodeEnvironment,
        owner: Arc<dyn IsolateOwner>,
        sink: &Arc<DiagnosticSink>,
    ) -> CodecResult<Value> {
        let mut ctx = ReadContext::new(
            bytes,
            env,
            Arc::clone(&self.resolver),
            ProblemReporter::new(Arc::clone(sink), self.options.max_problems),
            self.options.trace_frames,
        )
        .with_bindings(Arc::clone(&self.bindings));
        let root = ctx.with_isolate(owner, |ctx| ctx.read_value())?;
        if !ctx.is_at_end() {
            return Err(DecodeError::Other("trailing bytes after the root value").into());
        }
        tracing::debug!(
            bytes = bytes.len(),
            problems = ctx.problem_count(),
            "decoded graph"
        );
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::bean::Bean;
    use crate::bindings::CustomCodec;
    use crate::error::CodecError;
    use crate::isolate::{OwnerKind, OwnerScope};
    use crate::model::{
        BeanType, FieldDescriptor, FieldType, Method, PrimitiveKind, TypeRef, TypeRegistry,
    };
    use crate::problems::{TOO_MANY_PROBLEMS, UNSUPPORTED_FIELD_TYPE, UNSUPPORTED_TYPE};
    use crate::value::{BeanRef, NativeHandle, ServiceRef};

    fn owner() -> Arc<dyn IsolateOwner> {
        Arc::new(OwnerScope::build(":"))
    }

    fn roundtrip(codec: &GraphCodec, root: &Value, types: &[&TypeRef]) -> CodecResult<Value> {
        let sink = Arc::new(DiagnosticSink::new());
        let encoded = codec.encode(root, owner(), &sink)?;
        let mut registry = TypeRegistry::new();
        for ty in types {
            registry.register(ty);
        }
        let env = encoded.environment.resolve(&registry)?;
        codec.decode(&encoded.bytes, &env, owner(), &sink)
    }

    fn node_type() -> TypeRef {
        BeanType::builder("Node")
            .field(FieldDescriptor::new("name", FieldType::Str))
            .field(FieldDescriptor::new("next", FieldType::bean("Node")))
            .build()
    }

    #[test]
    fn cycles_roundtrip_to_the_same_shape() {
        let ty = node_type();
        let a = Bean::new(&ty).with("name", "a").into_ref();
        let b = Bean::new(&ty).with("name", "b").into_ref();
        a.borrow_mut().set("next", Value::Bean(Rc::clone(&b)));
        b.borrow_mut().set("next", Value::Bean(Rc::clone(&a)));

        let codec = GraphCodec::default();
        let decoded = roundtrip(&codec, &Value::Bean(a), &[&ty]).unwrap();
        let a2 = decoded.as_bean().unwrap().clone();
        let b2 = a2.borrow().get("next").unwrap().as_bean().unwrap().clone();
        let back = b2.borrow().get("next").unwrap().as_bean().unwrap().clone();
        assert!(Rc::ptr_eq(&a2, &back));
        assert_eq!(a2.borrow().get("name"), Some(&Value::str("a")));
        assert_eq!(b2.borrow().get("name"), Some(&Value::str("b")));
    }

    #[test]
    fn shared_beans_stay_shared() {
        let ty = node_type();
        let shared = Value::bean(Bean::new(&ty).with("name", "shared"));
        let root = Value::List(vec![shared.clone(), shared]);

        let decoded = roundtrip(&GraphCodec::default(), &root, &[&ty]).unwrap();
        let Value::List(items) = decoded else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], items[1]);
    }

    #[test]
    fn class_referenced_twice_has_one_environment_entry() {
        let target = BeanType::builder("org.example.Plugin").build();
        let holder = BeanType::builder("Holder")
            .field(FieldDescriptor::new("first", FieldType::Class))
            .field(FieldDescriptor::new("second", FieldType::Class))
            .build();
        let bean = Bean::new(&holder)
            .with("first", Value::Class(Arc::clone(&target)))
            .with("second", Value::Class(Arc::clone(&target)));

        let sink = Arc::new(DiagnosticSink::new());
        let codec = GraphCodec::default();
        let encoded = codec.encode(&Value::bean(bean), owner(), &sink).unwrap();
        assert_eq!(encoded.environment.classes, vec!["Holder", "org.example.Plugin"]);

        let mut registry = TypeRegistry::new();
        registry.register(&holder);
        registry.register(&target);
        let env = encoded.environment.resolve(&registry).unwrap();
        let decoded = codec.decode(&encoded.bytes, &env, owner(), &sink).unwrap();
        let bean = decoded.as_bean().unwrap().borrow();
        assert_eq!(bean.get("first"), bean.get("second"));
        assert_eq!(bean.get("first"), Some(&Value::Class(target)));
    }

    #[test]
    fn unsupported_field_degrades_gracefully() {
        let ty = BeanType::builder("Exec")
            .field(FieldDescriptor::new("process", FieldType::unsupported("java.lang.Process")))
            .field(FieldDescriptor::new("command", FieldType::Str))
            .build();
        let bean = Bean::new(&ty)
            .with("process", Value::Native(NativeHandle::new("java.lang.Process")))
            .with("command", "ls");
        let sink = Arc::new(DiagnosticSink::new());
        let codec = GraphCodec::default();
        let encoded = codec.encode(&Value::bean(bean), owner(), &sink).unwrap();
        assert_eq!(sink.count_of(UNSUPPORTED_FIELD_TYPE), 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(encoded.problems, 1);

        let location = &sink.diagnostics()[0].location;
        assert_eq!(location.to_string(), "field Exec.process of bean Exec");

        let mut registry = TypeRegistry::new();
        registry.register(&ty);
        let env = encoded.environment.resolve(&registry).unwrap();
        let decoded = codec.decode(&encoded.bytes, &env, owner(), &sink).unwrap();
        assert_eq!(
            decoded.as_bean().unwrap().borrow().get("command"),
            Some(&Value::str("ls"))
        );
    }

    #[test]
    fn conventions_are_persisted_when_unset() {
        let ty = BeanType::builder("JavaCompile")
            .field(FieldDescriptor::new("source", FieldType::Str))
            .field(
                FieldDescriptor::new("target", FieldType::Str)
                    .with_convention(|bean| bean.get("source").cloned().unwrap_or(Value::Null)),
            )
            .build();
        let bean = Bean::new(&ty).with("source", "17");
        let decoded = roundtrip(&GraphCodec::default(), &Value::bean(bean), &[&ty]).unwrap();
        let decoded = decoded.as_bean().unwrap().borrow();
        assert_eq!(decoded.get("target"), Some(&Value::str("17")));
    }

    #[test]
    fn legacy_hooks_roundtrip_custom_state() {
        let ty = BeanType::builder("Range")
            .field(FieldDescriptor::new("lo", FieldType::Primitive(PrimitiveKind::Int)))
            .field(FieldDescriptor::new("label", FieldType::Str))
            .method(Method::write_object(|bean, out| {
                out.default_write_object()?;
                out.write_boolean(true)?;
                out.write_int(bean.get("lo").and_then(Value::as_int).unwrap_or(0) * 2)?;
                out.write_utf("42")?;
                Ok(())
            }))
            .method(Method::read_object(|bean, input| {
                input.default_read_object()?;
                let flag = input.read_boolean()?;
                let doubled = input.read_int()?;
                let text = input.read_utf()?;
                let mut b = bean.borrow_mut();
                b.set("label", format!("{flag}/{doubled}/{text}"));
                Ok(())
            }))
            .build();
        let bean = Bean::new(&ty).with("lo", 21).with("label", "ignored");
        let decoded = roundtrip(&GraphCodec::default(), &Value::bean(bean), &[&ty]).unwrap();
        let decoded = decoded.as_bean().unwrap().borrow();
        assert_eq!(decoded.get("lo"), Some(&Value::Int(21)));
        assert_eq!(decoded.get("label"), Some(&Value::str("true/42/42")));
    }

    #[test]
    fn reordered_legacy_reads_fail() {
        let ty = BeanType::builder("Legacy")
            .method(Method::write_object(|_, out| {
                out.write_boolean(true)?;
                out.write_int(42)?;
                out.write_utf("42")?;
                Ok(())
            }))
            .method(Method::read_object(|_, input| {
                input.read_int()?;
                input.read_boolean()?;
                input.read_utf()?;
                Ok(())
            }))
            .build();
        let err =
            roundtrip(&GraphCodec::default(), &Value::bean(Bean::new(&ty)), &[&ty]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LegacyStreamMismatch { expected: "int", found: "boolean", .. }
        ));
    }

    #[test]
    fn legacy_levels_without_hooks_use_their_fields() {
        let base = BeanType::builder("Base")
            .field(FieldDescriptor::new("id", FieldType::Primitive(PrimitiveKind::Int)))
            .build();
        let derived = BeanType::builder("Derived")
            .extends(&base)
            .field(FieldDescriptor::new("extra", FieldType::Str))
            .method(Method::write_object(|bean, out| {
                out.write_utf(bean.get("extra").and_then(Value::as_str).unwrap_or(""))
                    .map_err(Into::into)
            }))
            .method(Method::read_object(|bean, input| {
                let extra = input.read_utf()?;
                bean.borrow_mut().set("extra", extra);
                Ok(())
            }))
            .build();
        let bean = Bean::new(&derived).with("id", 9).with("extra", "x");
        let decoded =
            roundtrip(&GraphCodec::default(), &Value::bean(bean), &[&base, &derived]).unwrap();
        let decoded = decoded.as_bean().unwrap().borrow();
        assert_eq!(decoded.get("id"), Some(&Value::Int(9)));
        assert_eq!(decoded.get("extra"), Some(&Value::str("x")));
    }

    #[test]
    fn substitute_is_written_in_place_of_the_bean() {
        let real = BeanType::builder("Real")
            .field(FieldDescriptor::new("value", FieldType::Str))
            .build();
        let real_for_hook = Arc::clone(&real);
        let proxy = BeanType::builder("Proxy")
            .field(FieldDescriptor::new("value", FieldType::Str))
            .method(Method::write_replace(move |bean| {
                let value = bean.get("value").cloned().unwrap_or(Value::Null);
                Ok(Value::bean(Bean::new(&real_for_hook).with("value", value)))
            }))
            .build();
        let original = Value::bean(Bean::new(&proxy).with("value", "v"));
        let root = Value::List(vec![original.clone(), original]);

        let sink = Arc::new(DiagnosticSink::new());
        let codec = GraphCodec::default();
        let encoded = codec.encode(&root, owner(), &sink).unwrap();
        assert_eq!(encoded.environment.classes, vec!["Real"]);
        assert_eq!(encoded.beans, 1);

        let decoded = roundtrip(&codec, &root, &[&real]).unwrap();
        let Value::List(items) = decoded else {
            panic!("expected a list");
        };
        assert_eq!(items[0], items[1]);
        assert_eq!(items[0].as_bean().unwrap().borrow().ty().name(), "Real");
    }

    #[test]
    fn resolve_on_read_replaces_every_reference() {
        let ty = BeanType::builder("Singleton")
            .method(Method::read_resolve(|_| Ok(Value::str("the-singleton"))))
            .build();
        let bean = Value::bean(Bean::new(&ty));
        let root = Value::List(vec![bean.clone(), bean]);
        let decoded = roundtrip(&GraphCodec::default(), &root, &[&ty]).unwrap();
        let canonical = Value::str("the-singleton");
        assert_eq!(decoded, Value::List(vec![canonical.clone(), canonical]));
    }

    #[test]
    fn constructor_runs_unless_type_is_generated() {
        let plain = BeanType::builder("Plain")
            .field(FieldDescriptor::new("origin", FieldType::Str).transient())
            .constructor(|ty| Ok(Bean::new(ty).with("origin", "constructor")))
            .build();
        let generated = BeanType::builder("Plain_Decorated")
            .extends(&plain)
            .generated()
            .constructor(|ty| Ok(Bean::new(ty).with("origin", "constructor")))
            .build();
        let root = Value::List(vec![
            Value::bean(Bean::new(&plain)),
            Value::bean(Bean::new(&generated)),
        ]);
        let decoded = roundtrip(&GraphCodec::default(), &root, &[&plain, &generated]).unwrap();
        let Value::List(items) = decoded else {
            panic!("expected a list");
        };
        let origin = |v: &Value| v.as_bean().unwrap().borrow().get("origin").cloned();
        assert_eq!(origin(&items[0]), Some(Value::str("constructor")));
        assert_eq!(origin(&items[1]), Some(Value::Null));
    }

    #[test]
    fn model_hook_sees_the_active_owner() {
        let ty = BeanType::builder("Project")
            .field(FieldDescriptor::new("attachedTo", FieldType::Str).transient())
            .model_object(|bean, owner| {
                bean.borrow_mut().set("attachedTo", owner.display_name());
                Ok(())
            })
            .build();
        let sink = Arc::new(DiagnosticSink::new());
        let codec = GraphCodec::default();
        let encoded = codec.encode(&Value::bean(Bean::new(&ty)), owner(), &sink).unwrap();
        let mut registry = TypeRegistry::new();
        registry.register(&ty);
        let env = encoded.environment.resolve(&registry).unwrap();
        let project: Arc<dyn IsolateOwner> = Arc::new(OwnerScope::new(OwnerKind::Project, ":app"));
        let decoded = codec.decode(&encoded.bytes, &env, project, &sink).unwrap();
        assert_eq!(
            decoded.as_bean().unwrap().borrow().get("attachedTo"),
            Some(&Value::str("project ':app'"))
        );
    }

    #[test]
    fn hook_errors_pass_through() {
        let ty = BeanType::builder("Broken")
            .method(Method::write_replace(|_| Err("cannot replace".into())))
            .build();
        let sink = Arc::new(DiagnosticSink::new());
        let err = GraphCodec::default()
            .encode(&Value::bean(Bean::new(&ty)), owner(), &sink)
            .unwrap_err();
        assert!(matches!(&err, CodecError::Hook(_)));
        assert_eq!(err.to_string(), "cannot replace");
    }

    #[test]
    fn too_many_problems_fails_the_pass() {
        let codec = GraphCodec::new(CodecOptions {
            max_problems: 2,
            trace_frames: true,
        });
        let native = Value::Native(NativeHandle::new("java.net.Socket"));
        let root = Value::List(vec![native.clone(), native.clone(), native]);
        let sink = Arc::new(DiagnosticSink::new());
        let err = codec.encode(&root, owner(), &sink).unwrap_err();
        assert!(matches!(err, CodecError::TooManyProblems { count: 3 }));
        assert_eq!(sink.count_of(TOO_MANY_PROBLEMS), 1);
    }

    #[test]
    fn services_are_looked_up_by_name_on_decode() {
        let ty = BeanType::builder("Listener")
            .field(FieldDescriptor::new("events", FieldType::Service))
            .build();
        let events = Value::Service(ServiceRef::new("buildEvents", 1u8));
        let bean = Bean::new(&ty).with("events", events);
        let sink = Arc::new(DiagnosticSink::new());
        let codec = GraphCodec::default();
        let encoded = codec.encode(&Value::bean(bean), owner(), &sink).unwrap();

        let mut registry = TypeRegistry::new();
        registry.register(&ty);
        let env = encoded.environment.resolve(&registry).unwrap();
        let live: Arc<dyn IsolateOwner> =
            Arc::new(OwnerScope::build(":").with_service(ServiceRef::new("buildEvents", 2u8)));
        let decoded = codec.decode(&encoded.bytes, &env, live, &sink).unwrap();
        let bean = decoded.as_bean().unwrap().borrow();
        let Some(Value::Service(service)) = bean.get("events") else {
            panic!("expected a service");
        };
        assert_eq!(service.downcast_ref::<u8>(), Some(&2));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let sink = Arc::new(DiagnosticSink::new());
        let codec = GraphCodec::default();
        let mut encoded = codec.encode(&Value::Int(1), owner(), &sink).unwrap();
        encoded.bytes.push(0);
        let env = DecodeEnvironment::default();
        assert!(matches!(
            codec.decode(&encoded.bytes, &env, owner(), &sink),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn constructor_of_another_type_fails_the_decode() {
        let other = BeanType::builder("Other").build();
        let ty = BeanType::builder("Task")
            .field(FieldDescriptor::new("name", FieldType::Str))
            .constructor(move |_| Ok(Bean::new(&other)))
            .build();
        let bean = Bean::new(&ty).with("name", "build");
        let err = roundtrip(&GraphCodec::default(), &Value::bean(bean), &[&ty]).unwrap_err();
        assert!(matches!(err, CodecError::ConstructorTypeMismatch { .. }));
    }

    #[test]
    fn corrupt_length_prefix_is_a_decode_error() {
        let mut bytes = vec![crate::context::tag::BYTES, 253];
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        let sink = Arc::new(DiagnosticSink::new());
        let env = DecodeEnvironment::default();
        assert!(matches!(
            GraphCodec::default().decode(&bytes, &env, owner(), &sink),
            Err(CodecError::Decode(_))
        ));
    }

    /// Writes only the `paths` of a file collection.
    struct PathsCodec;

    impl CustomCodec for PathsCodec {
        fn encode(&self, ctx: &mut WriteContext, bean: &BeanRef) -> CodecResult<()> {
            let paths = bean.borrow().get("paths").cloned().unwrap_or(Value::Null);
            ctx.write_value(&paths)
        }

        fn decode(&self, ctx: &mut ReadContext<'_>, ty: &TypeRef) -> CodecResult<Value> {
            let paths = ctx.read_value()?;
            Ok(Value::bean(Bean::new(ty).with("paths", paths)))
        }
    }

    fn file_collection_type() -> TypeRef {
        BeanType::builder("FileCollection")
            .field(FieldDescriptor::new("paths", FieldType::List))
            .method(Method::write_object(|_, _| Err("field walk must not run".into())))
            .build()
    }

    fn task_type() -> TypeRef {
        BeanType::builder("Task")
            .field(FieldDescriptor::new("inputs", FieldType::bean("FileCollection")))
            .field(FieldDescriptor::new("outputs", FieldType::bean("FileCollection")))
            .build()
    }

    #[test]
    fn bound_types_roundtrip_through_their_codec() {
        let files = file_collection_type();
        let task = task_type();
        let collection = Value::bean(
            Bean::new(&files).with("paths", Value::List(vec![Value::str("src/main.rs")])),
        );
        let bean = Bean::new(&task)
            .with("inputs", collection.clone())
            .with("outputs", collection);
        let codec = GraphCodec::default()
            .with_bindings(CodecBindings::new().bind("FileCollection", PathsCodec));

        let decoded = roundtrip(&codec, &Value::bean(bean), &[&task, &files]).unwrap();
        let decoded = decoded.as_bean().unwrap().borrow();
        let inputs = decoded.get("inputs").unwrap().as_bean().unwrap().clone();
        let outputs = decoded.get("outputs").unwrap().as_bean().unwrap().clone();
        assert!(Rc::ptr_eq(&inputs, &outputs));
        assert_eq!(
            inputs.borrow().get("paths"),
            Some(&Value::List(vec![Value::str("src/main.rs")]))
        );
    }

    #[test]
    fn unsupported_binding_writes_null_with_a_warning() {
        let thread = BeanType::builder("Thread").build();
        let holder = BeanType::builder("Daemon")
            .field(FieldDescriptor::new("worker", FieldType::bean("Thread")))
            .field(FieldDescriptor::new("name", FieldType::Str))
            .build();
        let bean = Bean::new(&holder)
            .with("worker", Value::bean(Bean::new(&thread)))
            .with("name", "gc");
        let codec =
            GraphCodec::default().with_bindings(CodecBindings::new().unsupported("Thread"));

        let sink = Arc::new(DiagnosticSink::new());
        let encoded = codec.encode(&Value::bean(bean), owner(), &sink).unwrap();
        assert_eq!(sink.count_of(UNSUPPORTED_TYPE), 1);
        assert_eq!(
            sink.diagnostics()[0].message,
            "cannot serialize object of type `Thread`"
        );
        assert_eq!(encoded.environment.classes, vec!["Daemon"]);

        let mut registry = TypeRegistry::new();
        registry.register(&holder);
        let env = encoded.environment.resolve(&registry).unwrap();
        let decoded = codec.decode(&encoded.bytes, &env, owner(), &sink).unwrap();
        let decoded = decoded.as_bean().unwrap().borrow();
        assert!(decoded.get("worker").map_or(true, Value::is_null));
        assert_eq!(decoded.get("name"), Some(&Value::str("gc")));
    }

    #[test]
    fn custom_record_without_binding_fails_the_decode() {
        let files = file_collection_type();
        let bean = Bean::new(&files).with("paths", Value::List(Vec::new()));
        let bound = GraphCodec::default()
            .with_bindings(CodecBindings::new().bind("FileCollection", PathsCodec));
        let sink = Arc::new(DiagnosticSink::new());
        let encoded = bound.encode(&Value::bean(bean), owner(), &sink).unwrap();

        let mut registry = TypeRegistry::new();
        registry.register(&files);
        let env = encoded.environment.resolve(&registry).unwrap();
        let err = GraphCodec::default()
            .decode(&encoded.bytes, &env, owner(), &sink)
            .unwrap_err();
        assert!(matches!(err, CodecError::MissingBinding(name) if name == "FileCollection"));
    }

    #[test]
    fn shared_resolver_classifies_once_across_passes() {
        let ty = BeanType::builder("Legacy")
            .method(Method::write_object(|_, out| out.write_int(1).map_err(Into::into)))
            .build();
        let codec = GraphCodec::default();
        let sink = Arc::new(DiagnosticSink::new());
        codec.encode(&Value::bean(Bean::new(&ty)), owner(), &sink).unwrap();
        codec.encode(&Value::bean(Bean::new(&ty)), owner(), &sink).unwrap();
        assert_eq!(codec.resolver().inspection_count(), 1);
    }
}
