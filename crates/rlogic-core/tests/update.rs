//! End-to-end tests of the evaluation pass through the public engine API.
//!
//! Scripts are provided by a `NativeScriptRuntime`; bound scene objects are
//! stand-ins that record what the engine pushes into them.

use std::cell::RefCell;
use std::rc::Rc;

use rlogic_core::math::{self, IDENTITY};
use rlogic_core::{
    AnimationChannel, AnimationNodeConfig, BindingKind, BindingTarget, Clock, CoreError, ErrorKind, FeatureLevel,
    Interpolation, LinkError, LogicEngine, Mat4, NativeScriptRuntime, NodeHandle, PropertySpec, PropertyType,
    PropertyValue, ScriptConfig,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn int_io(input: &str, output: &str) -> (PropertySpec, PropertySpec) {
    (
        PropertySpec::structure("", vec![PropertySpec::leaf(input, PropertyType::Int32)]),
        PropertySpec::structure("", vec![PropertySpec::leaf(output, PropertyType::Int32)]),
    )
}

fn runtime() -> NativeScriptRuntime {
    let mut rt = NativeScriptRuntime::new();
    let (i, o) = int_io("x", "y");
    rt.register("double", i.clone(), o.clone(), |io| {
        let x = io.get_input::<i32>("x").unwrap_or_default();
        io.set_output("y", x * 2)
    });
    rt.register("inc", i.clone(), o.clone(), |io| {
        let x = io.get_input::<i32>("x").unwrap_or_default();
        io.set_output("y", x + 1)
    });
    rt.register("fail", i, o, |_| Err("script failed on purpose".to_owned()));
    rt.register(
        "halve",
        PropertySpec::structure("", vec![PropertySpec::leaf("f", PropertyType::Float)]),
        PropertySpec::structure("", vec![PropertySpec::leaf("g", PropertyType::Float)]),
        |io| {
            let f = io.get_input::<f32>("f").unwrap_or_default();
            io.set_output("g", f / 2.0)
        },
    );
    rt
}

fn engine(level: FeatureLevel) -> LogicEngine {
    LogicEngine::new(level).with_script_runtime(runtime())
}

fn script(engine: &mut LogicEngine, source: &str, name: &str) -> NodeHandle {
    engine.create_script(source, &ScriptConfig::default(), name).unwrap()
}

struct FixedClock(i64);

impl Clock for FixedClock {
    fn now_us(&self) -> i64 {
        self.0
    }
}

#[derive(Default)]
struct Probe {
    applied: Vec<(String, PropertyValue)>,
    joints: Vec<Mat4>,
}

/// Scene object stand-in.
struct SceneObject {
    name: &'static str,
    world: Option<Mat4>,
    camera: Option<(Mat4, [i32; 4])>,
    probe: Rc<RefCell<Probe>>,
}

impl SceneObject {
    fn new(name: &'static str) -> (Self, Rc<RefCell<Probe>>) {
        let probe = Rc::new(RefCell::new(Probe::default()));
        (
            SceneObject {
                name,
                world: None,
                camera: None,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl BindingTarget for SceneObject {
    fn name(&self) -> &str {
        self.name
    }

    fn object_id(&self) -> u64 {
        7
    }

    fn scene_id(&self) -> u64 {
        1
    }

    fn apply(&mut self, path: &str, value: &PropertyValue) -> Result<(), String> {
        self.probe.borrow_mut().applied.push((path.to_owned(), value.clone()));
        Ok(())
    }

    fn world_matrix(&self) -> Option<Mat4> {
        self.world
    }

    fn view_projection(&self) -> Option<(Mat4, [i32; 4])> {
        self.camera
    }

    fn set_joint_matrices(&mut self, _uniform: &str, matrices: &[Mat4]) -> Result<(), String> {
        self.probe.borrow_mut().joints = matrices.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Links and propagation
// ---------------------------------------------------------------------------

#[test]
fn strong_link_propagates_within_one_update() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    engine
        .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
        .unwrap();

    assert!(engine.set(engine.input(a, "x").unwrap(), 3i32));
    engine.update().unwrap();

    assert_eq!(engine.get::<i32>(engine.output(a, "y").unwrap()), Some(6));
    assert_eq!(engine.get::<i32>(engine.output(b, "y").unwrap()), Some(12));
}

#[test]
fn weak_link_lags_one_update() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    let b_x = engine.input(b, "x").unwrap();
    engine.link_weak(engine.output(a, "y").unwrap(), b_x).unwrap();

    engine.set(engine.input(a, "x").unwrap(), 3i32);
    engine.update().unwrap();
    assert_eq!(engine.get::<i32>(b_x), Some(0));

    engine.update().unwrap();
    assert_eq!(engine.get::<i32>(b_x), Some(6));
    assert_eq!(engine.get::<i32>(engine.output(b, "y").unwrap()), Some(12));
}

#[test]
fn weak_link_may_close_a_loop() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "inc", "a");
    let b = script(&mut engine, "inc", "b");
    let a_x = engine.input(a, "x").unwrap();
    engine
        .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
        .unwrap();
    engine.link_weak(engine.output(b, "y").unwrap(), a_x).unwrap();

    engine.update().unwrap();
    engine.update().unwrap();

    assert_eq!(engine.get::<i32>(a_x), Some(2));
    assert_eq!(engine.get::<i32>(engine.output(b, "y").unwrap()), Some(4));
}

#[test]
fn strong_cycle_is_rejected_and_graph_unchanged() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    engine
        .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
        .unwrap();

    let err = engine
        .link(engine.output(b, "y").unwrap(), engine.input(a, "x").unwrap())
        .unwrap_err();
    assert!(matches!(err, CoreError::Link(LinkError::WouldCreateCycle { .. })));
    insta::assert_snapshot!(err.to_string(), @"Failed to link output property 'y' of LogicNode 'b' to input property 'x' of LogicNode 'a': the link would create a loop");
    assert_eq!(engine.errors().len(), 1);
    assert_eq!(engine.errors()[0].kind, ErrorKind::Link);
    assert_eq!(engine.links().len(), 1);
    engine.update().unwrap();
}

#[test]
fn link_validation_messages() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    let a_x = engine.input(a, "x").unwrap();
    let a_y = engine.output(a, "y").unwrap();
    let b_x = engine.input(b, "x").unwrap();

    let wrong_direction = engine.link(a_x, b_x).unwrap_err();
    assert_eq!(
        wrong_direction.to_string(),
        "Failed to link input property 'x' to input property 'x'. Only outputs can be linked to inputs"
    );

    let same_node = engine.link(a_y, a_x).unwrap_err();
    assert_eq!(
        same_node.to_string(),
        "Link source and target can't belong to the same node! ('a')"
    );

    let complex = engine.link(engine.outputs(a).unwrap(), b_x).unwrap_err();
    assert_eq!(complex, CoreError::Link(LinkError::NotPrimitive));

    engine.link(a_y, b_x).unwrap();
    let c = script(&mut engine, "double", "c");
    let twice = engine.link(engine.output(c, "y").unwrap(), b_x).unwrap_err();
    assert_eq!(
        twice.to_string(),
        "The property 'x' of LogicNode 'b' is already linked (to property 'y' of LogicNode 'a')"
    );
}

#[test]
fn linked_input_cannot_be_set() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    let a_y = engine.output(a, "y").unwrap();
    let b_x = engine.input(b, "x").unwrap();
    engine.link(a_y, b_x).unwrap();

    assert!(!engine.set(b_x, 5i32));
    assert!(engine.has_incoming_link(b_x));
    assert!(engine.is_linked(a) && engine.is_linked(b));

    engine.unlink(a_y, b_x).unwrap();
    assert!(engine.set(b_x, 5i32));
    assert!(!engine.is_linked(b));

    let err = engine.unlink(a_y, b_x).unwrap_err();
    assert_eq!(err.to_string(), "Input property 'x' is not currently linked!");
}

#[test]
fn properties_of_another_engine_cannot_be_linked() {
    let mut a = engine(FeatureLevel::Level01);
    let mut b = engine(FeatureLevel::Level01);
    let a_node = script(&mut a, "double", "a");
    let b_node = script(&mut b, "double", "b");
    let a_y = a.output(a_node, "y").unwrap();
    let b_y = b.output(b_node, "y").unwrap();
    let b_x = b.input(b_node, "x").unwrap();

    let err = b.link(a_y, b_x).unwrap_err();
    assert!(matches!(err, CoreError::ForeignObject { kind: "Property", .. }));
    assert_eq!(b.errors().len(), 1);
    assert!(b.links().is_empty());
    assert!(!b.is_linked(b_node));

    assert!(b.link_weak(a_y, b_x).is_err());
    assert!(b.links().is_empty());

    let err = b.unlink(a_y, b_x).unwrap_err();
    assert!(matches!(err, CoreError::ForeignObject { kind: "Property", .. }));
    assert!(!b.is_linked(a_node));

    let other = script(&mut b, "double", "other");
    b.link(b_y, b.input(other, "x").unwrap()).unwrap();
    assert!(b.is_linked(b_node));
    assert!(!b.is_linked(a_node));
    assert!(!b.has_outgoing_link(a_y));
    assert!(b.has_outgoing_link(b_y));
}

#[test]
fn destroying_a_node_removes_its_links() {
    let mut engine = engine(FeatureLevel::Level01);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    let c = script(&mut engine, "double", "c");
    engine
        .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
        .unwrap();
    engine
        .link(engine.output(b, "y").unwrap(), engine.input(c, "x").unwrap())
        .unwrap();

    engine.destroy(b).unwrap();

    assert!(engine.links().is_empty());
    assert!(!engine.is_linked(a));
    assert!(!engine.is_linked(c));
    assert!(engine.node(b).is_none());
    assert!(engine.input(b, "x").is_none());
    engine.update().unwrap();
}

// ---------------------------------------------------------------------------
// Dirty tracking and reports
// ---------------------------------------------------------------------------

#[test]
fn second_update_without_changes_is_a_no_op() {
    let mut engine = engine(FeatureLevel::Level01);
    engine.enable_update_report(true);
    let a = script(&mut engine, "double", "a");
    let b = script(&mut engine, "double", "b");
    engine
        .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
        .unwrap();
    engine.set(engine.input(a, "x").unwrap(), 2i32);

    engine.update().unwrap();
    let first = engine.last_update_report().clone();
    assert_eq!(first.executed, vec![a.id(), b.id()]);
    assert_eq!(first.activated_links, 1);

    engine.update().unwrap();
    let second = engine.last_update_report();
    assert!(second.executed.is_empty());
    assert_eq!(second.skipped, vec![a.id(), b.id()]);
    assert_eq!(second.activated_links, 0);
    assert_eq!(engine.get::<i32>(engine.output(b, "y").unwrap()), Some(8));
}

#[test]
fn setting_an_unchanged_value_still_reruns_the_node() {
    let mut engine = engine(FeatureLevel::Level01);
    engine.enable_update_report(true);
    let a = script(&mut engine, "double", "a");
    engine.update().unwrap();

    engine.set(engine.input(a, "x").unwrap(), 0i32);
    engine.update().unwrap();
    assert_eq!(engine.last_update_report().executed, vec![a.id()]);
}

#[test]
fn linked_nan_settles_after_one_update() {
    let mut engine = engine(FeatureLevel::Level01);
    engine.enable_update_report(true);
    let iface = engine
        .create_interface(
            &PropertySpec::structure("", vec![PropertySpec::leaf("speed", PropertyType::Float)]),
            "iface",
        )
        .unwrap();
    let half = script(&mut engine, "halve", "half");
    engine
        .link(engine.output(iface, "speed").unwrap(), engine.input(half, "f").unwrap())
        .unwrap();

    engine.set(engine.input(iface, "speed").unwrap(), f32::NAN);
    engine.update().unwrap();
    assert_eq!(engine.last_update_report().executed, vec![iface.id(), half.id()]);
    assert!(engine
        .get::<f32>(engine.output(half, "g").unwrap())
        .is_some_and(f32::is_nan));

    engine.update().unwrap();
    assert!(engine.last_update_report().executed.is_empty());
}

#[test]
fn disabled_dirty_tracking_runs_everything() {
    let mut engine = engine(FeatureLevel::Level01);
    engine.enable_update_report(true);
    engine.disable_dirty_tracking();
    let a = script(&mut engine, "double", "a");
    engine.update().unwrap();
    engine.update().unwrap();
    assert_eq!(engine.last_update_report().executed, vec![a.id()]);
}

#[test]
fn statistics_window_closes_after_logging_rate_updates() {
    let mut engine = engine(FeatureLevel::Level01);
    script(&mut engine, "double", "a");
    assert!(!engine.update_statistics().is_enabled());

    engine.set_statistics_logging_rate(2);
    engine.update().unwrap();
    assert_eq!(engine.update_statistics().collected(), 1);
    engine.update().unwrap();
    assert_eq!(engine.update_statistics().collected(), 0);

    engine.update().unwrap();
    engine.set_statistics_logging_rate(0);
    engine.update().unwrap();
    assert_eq!(engine.update_statistics().collected(), 0);
}

#[test]
fn runtime_error_stops_the_pass() {
    let mut engine = engine(FeatureLevel::Level01);
    let ok = script(&mut engine, "double", "ok");
    let failing = script(&mut engine, "fail", "failing");
    let after = script(&mut engine, "double", "after");
    engine
        .link(engine.output(failing, "y").unwrap(), engine.input(after, "x").unwrap())
        .unwrap();
    engine.set(engine.input(ok, "x").unwrap(), 1i32);

    let err = engine.update().unwrap_err();
    assert_eq!(
        err,
        CoreError::Runtime {
            node: failing.id(),
            message: "script failed on purpose".to_owned(),
        }
    );
    assert_eq!(engine.errors()[0].kind, ErrorKind::Runtime);
    assert_eq!(engine.errors()[0].object, Some(failing.id()));
    assert_eq!(engine.get::<i32>(engine.output(ok, "y").unwrap()), Some(2));
    assert!(engine.node(after).unwrap().is_dirty());
}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

#[test]
fn interface_mirrors_inputs() {
    let mut engine = engine(FeatureLevel::Level01);
    let spec = PropertySpec::structure(
        "",
        vec![
            PropertySpec::leaf("speed", PropertyType::Float),
            PropertySpec::structure("pos", vec![PropertySpec::leaf("xy", PropertyType::Vec2f)]),
        ],
    );
    let iface = engine.create_interface(&spec, "iface").unwrap();
    engine.set(engine.input(iface, "pos.xy").unwrap(), [1.0f32, 2.0]);
    engine.update().unwrap();
    assert_eq!(
        engine.get::<[f32; 2]>(engine.output(iface, "pos.xy").unwrap()),
        Some([1.0, 2.0])
    );
}

#[test]
fn timer_uses_clock_unless_driven() {
    let mut engine = engine(FeatureLevel::Level01);
    engine.set_clock(FixedClock(42));
    let timer = engine.create_timer_node("timer").unwrap();
    let out = engine.output(timer, "ticker_us").unwrap();

    engine.update().unwrap();
    assert_eq!(engine.get::<i64>(out), Some(42));

    engine.set(engine.input(timer, "ticker_us").unwrap(), 7i64);
    engine.update().unwrap();
    assert_eq!(engine.get::<i64>(out), Some(7));
}

#[test]
fn animation_samples_linear_channel() {
    let mut engine = engine(FeatureLevel::Level01);
    let ts = engine.create_data_array(vec![0.0f32, 2.0], "ts").unwrap();
    let kf = engine.create_data_array(vec![0.0f32, 10.0], "kf").unwrap();
    let mut config = AnimationNodeConfig::new();
    config.add_channel(AnimationChannel::new("x", ts, kf, Interpolation::Linear));
    let anim = engine.create_animation_node(&config, "anim").unwrap();

    engine.set(engine.input(anim, "progress").unwrap(), 0.25f32);
    engine.update().unwrap();
    assert_eq!(engine.get::<f32>(engine.output(anim, "duration").unwrap()), Some(2.0));
    assert_eq!(engine.get::<f32>(engine.output(anim, "x").unwrap()), Some(2.5));
}

#[test]
fn binding_applies_each_new_value_once() {
    let mut engine = engine(FeatureLevel::Level01);
    let (target, probe) = SceneObject::new("node");
    let binding = engine.create_binding(BindingKind::Node, target, "nb").unwrap();

    engine.update().unwrap();
    assert!(probe.borrow().applied.is_empty());

    engine.set(engine.input(binding, "translation").unwrap(), [1.0f32, 2.0, 3.0]);
    assert!(engine
        .validate()
        .iter()
        .any(|w| w.message.starts_with("Saving logic engine content with manually updated binding values")));
    engine.update().unwrap();
    engine.update().unwrap();

    assert_eq!(
        probe.borrow().applied,
        vec![("translation".to_owned(), PropertyValue::Vec3f([1.0, 2.0, 3.0]))]
    );
}

#[test]
fn linked_binding_receives_script_output() {
    let mut engine = engine(FeatureLevel::Level01);
    let (target, _) = SceneObject::new("pass");
    let refused = engine.create_binding(BindingKind::RenderPass, target, "rp");
    assert!(matches!(refused, Err(CoreError::FeatureLevel { .. })));

    let mut engine = self::engine(FeatureLevel::Level02);
    let (target, probe) = SceneObject::new("pass");
    let pass = engine.create_binding(BindingKind::RenderPass, target, "rp").unwrap();
    let a = script(&mut engine, "double", "a");
    engine
        .link(engine.output(a, "y").unwrap(), engine.input(pass, "renderOrder").unwrap())
        .unwrap();
    engine.set(engine.input(a, "x").unwrap(), 21i32);
    engine.update().unwrap();

    assert_eq!(
        probe.borrow().applied,
        vec![("renderOrder".to_owned(), PropertyValue::Int32(42))]
    );
}

#[test]
fn anchor_point_projects_node_origin() {
    let mut engine = engine(FeatureLevel::Level02);
    let (mut node, _) = SceneObject::new("node");
    node.world = Some(math::translation(0.5, 0.0, 0.0));
    let (mut camera, _) = SceneObject::new("camera");
    camera.camera = Some((IDENTITY, [0, 0, 100, 50]));

    let nb = engine.create_binding(BindingKind::Node, node, "nb").unwrap();
    let cb = engine.create_binding(BindingKind::Camera, camera, "cb").unwrap();
    let anchor = engine.create_anchor_point(nb, cb, "anchor").unwrap();

    engine.update().unwrap();
    assert_eq!(
        engine.get::<[f32; 2]>(engine.output(anchor, "viewportCoords").unwrap()),
        Some([75.0, 25.0])
    );
    assert_eq!(engine.get::<f32>(engine.output(anchor, "depth").unwrap()), Some(0.5));

    let err = engine.destroy(cb).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to destroy camera binding 'cb', it is used in anchor point 'anchor'"
    );
}

#[test]
fn skin_binding_pushes_joint_matrices() {
    let mut engine = engine(FeatureLevel::Level04);
    let (mut joint, _) = SceneObject::new("joint");
    joint.world = Some(math::translation(1.0, 2.0, 3.0));
    let (appearance, probe) = SceneObject::new("appearance");

    let j = engine.create_binding(BindingKind::Node, joint, "joint").unwrap();
    let app = engine.create_binding(BindingKind::Appearance, appearance, "app").unwrap();
    let skin = engine
        .create_skin_binding(&[j], &[IDENTITY], app, "u_jointMat", "skin")
        .unwrap();

    engine.update().unwrap();
    assert_eq!(probe.borrow().joints, vec![math::translation(1.0, 2.0, 3.0)]);

    let err = engine.destroy(app).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to destroy appearance binding 'app', it is used in skin binding 'skin'"
    );
    engine.destroy(skin).unwrap();
    engine.destroy(app).unwrap();
}

#[test]
fn validation_reports_dangling_nodes() {
    let mut engine = engine(FeatureLevel::Level01);
    script(&mut engine, "double", "lonely");
    let messages: Vec<String> = engine.validate().into_iter().map(|w| w.message).collect();
    assert_eq!(
        messages,
        vec![
            "Node [lonely] has no outgoing links! Node should be deleted or properly linked!".to_owned(),
            "Node [lonely] has no ingoing links! Node should be deleted or properly linked!".to_owned(),
        ]
    );
}
