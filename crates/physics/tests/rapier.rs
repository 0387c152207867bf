#![cfg(feature = "rapier")]

use std::path::Path;

use physics::{
    quat_from_euler, BackendError, BodyHandle, ConnectionMode, IntegrationParams, JointState,
    Link, Material, PhysicsBackend, Pose, RapierBackend, Vec3,
};

const STRIDER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/strider.json");
const CRAWLER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/crawler.json");

fn params() -> IntegrationParams {
    IntegrationParams {
        fixed_time_step: 0.04,
        solver_iterations: 5,
        sub_steps: 4,
    }
}

fn bent(position: f32) -> JointState {
    JointState {
        position,
        velocity: 0.0,
    }
}

fn world(gravity: bool) -> anyhow::Result<(RapierBackend, BodyHandle)> {
    let mut backend = RapierBackend::connect(ConnectionMode::Headless)?;
    backend.configure_integration(params())?;
    if gravity {
        backend.set_gravity(Vec3::new(0.0, 0.0, -9.81))?;
        backend.create_ground_plane(Material::new(3.0, 0.1))?;
    }
    let body = backend.load_body(Path::new(STRIDER))?;
    Ok((backend, body))
}

#[test]
fn load_body_reports_joint_metadata() -> anyhow::Result<()> {
    let (backend, body) = world(true)?;
    assert_eq!(backend.joint_count(body)?, 4);
    let knee = backend.joint_limits(body, 3)?;
    assert!((knee.lower + 1.3).abs() < 1e-6);
    assert!((knee.upper - 0.1).abs() < 1e-6);
    assert!((knee.max_force - 15.0).abs() < 1e-6);
    let pose = backend.pose(body)?;
    assert!((pose.position - Vec3::new(0.0, 0.0, 0.6)).length() < 1e-6);
    for joint in 0..4 {
        let state = backend.joint_state(body, joint)?;
        assert!(state.position.abs() < 1e-5, "joint {joint}: {}", state.position);
    }
    assert!((backend.integration().sub_step_duration() - 0.01).abs() < 1e-7);
    Ok(())
}

#[test]
fn dropped_body_settles_on_the_ground() -> anyhow::Result<()> {
    let (mut backend, body) = world(true)?;
    for _ in 0..100 {
        backend.step_integration()?;
    }
    let pose = backend.pose(body)?;
    assert!(pose.position.z > 0.02, "base sank to {}", pose.position.z);
    assert!(pose.position.z < 0.6, "base never fell: {}", pose.position.z);
    assert!(pose.position.is_finite());
    let velocity = backend.velocity(body)?;
    assert!(velocity.linear.length() < 0.5, "still moving at {}", velocity.linear);
    Ok(())
}

#[test]
fn motor_tracks_its_position_target() -> anyhow::Result<()> {
    let (mut backend, body) = world(false)?;
    backend.set_joint_position_target(body, 0, 0.5, 20.0, 4.0)?;
    for _ in 0..50 {
        backend.step_integration()?;
    }
    let hip = backend.joint_state(body, 0)?;
    assert!((hip.position - 0.5).abs() < 0.1, "hip at {}", hip.position);
    assert!(hip.velocity.abs() < 0.5);
    assert_eq!(backend.motor_target(body, 0)?, Some(0.5));
    assert_eq!(backend.motor_target(body, 1)?, None);
    Ok(())
}

#[test]
fn chained_joints_are_measured_relative_to_their_parent() -> anyhow::Result<()> {
    let (mut backend, body) = world(false)?;
    backend.reset_joint_state(body, 2, bent(0.4))?;
    let hip = backend.joint_state(body, 2)?;
    let knee = backend.joint_state(body, 3)?;
    assert!((hip.position - 0.4).abs() < 1e-4, "hip at {}", hip.position);
    assert!(knee.position.abs() < 1e-4, "knee at {}", knee.position);

    backend.reset_joint_state(body, 3, bent(-0.7))?;
    assert!((backend.joint_state(body, 2)?.position - 0.4).abs() < 1e-4);
    assert!((backend.joint_state(body, 3)?.position + 0.7).abs() < 1e-4);
    Ok(())
}

#[test]
fn reset_pose_moves_the_body_rigidly() -> anyhow::Result<()> {
    let (mut backend, body) = world(true)?;
    backend.reset_joint_state(body, 0, bent(0.3))?;
    for _ in 0..20 {
        backend.step_integration()?;
    }
    let before = backend.joint_state(body, 0)?.position;

    let target = Pose::new(Vec3::new(2.0, -1.0, 0.6), quat_from_euler(0.0, 0.0, 1.0));
    backend.reset_pose(body, target)?;
    let pose = backend.pose(body)?;
    assert!((pose.position - target.position).length() < 1e-5);
    assert!(pose.orientation.angle_between(target.orientation) < 1e-4);
    assert!((backend.joint_state(body, 0)?.position - before).abs() < 1e-4);
    Ok(())
}

#[test]
fn reset_restores_joints_and_velocity() -> anyhow::Result<()> {
    let (mut backend, body) = world(true)?;
    let initial = backend.pose(body)?;
    for _ in 0..30 {
        backend.set_joint_position_target(body, 1, -0.6, 20.0, 4.0)?;
        backend.step_integration()?;
    }
    backend.reset_pose(body, initial)?;
    backend.reset_velocity(body, physics::Velocity::ZERO)?;
    for joint in 0..4 {
        backend.reset_joint_state(body, joint, JointState::ZERO)?;
    }
    let pose = backend.pose(body)?;
    assert!((pose.position - initial.position).length() < 1e-5);
    assert!(backend.velocity(body)?.linear.length() < 1e-5);
    for joint in 0..4 {
        let state = backend.joint_state(body, joint)?;
        assert!(state.position.abs() < 1e-4, "joint {joint}: {}", state.position);
        assert!(state.velocity.abs() < 1e-4, "joint {joint}: {}", state.velocity);
    }
    assert_eq!(backend.motor_target(body, 1)?, None);
    Ok(())
}

#[test]
fn identical_commands_give_identical_states() -> anyhow::Result<()> {
    let (mut a, body_a) = world(true)?;
    let (mut b, body_b) = world(true)?;
    for i in 0..40u8 {
        let target = f32::from(i % 7) * 0.2 - 0.6;
        for (backend, body) in [(&mut a, body_a), (&mut b, body_b)] {
            backend.set_joint_position_target(body, 0, target, 20.0, 4.0)?;
            backend.set_joint_position_target(body, 3, -target, 15.0, 3.0)?;
            backend.step_integration()?;
        }
    }
    let (pose_a, pose_b) = (a.pose(body_a)?, b.pose(body_b)?);
    assert!((pose_a.position - pose_b.position).length() < 1e-6);
    assert!(pose_a.orientation.angle_between(pose_b.orientation) < 1e-5);
    Ok(())
}

#[test]
fn materials_are_stored_per_link() -> anyhow::Result<()> {
    let (mut backend, body) = world(true)?;
    backend.set_material(body, Link::Joint(3), Material::new(0.2, 0.3))?;
    let knee = backend.material(body, Link::Joint(3))?;
    assert!((knee.friction - 0.2).abs() < 1e-6);
    assert!((knee.restitution - 0.3).abs() < 1e-6);
    assert_eq!(backend.material(body, Link::Base)?, Material::default());
    let ground = backend.ground().expect("ground plane exists");
    assert!((ground.friction - 3.0).abs() < 1e-6);
    assert!(matches!(
        backend.set_material(body, Link::Joint(9), Material::default()),
        Err(BackendError::UnknownLink { link: 9, .. })
    ));
    Ok(())
}

#[test]
fn models_without_geometry_use_default_links() -> anyhow::Result<()> {
    let mut backend = RapierBackend::connect(ConnectionMode::Headless)?;
    backend.configure_integration(params())?;
    backend.set_gravity(Vec3::new(0.0, 0.0, -9.81))?;
    backend.create_ground_plane(Material::new(3.0, 0.1))?;
    let body = backend.load_body(Path::new(CRAWLER))?;
    for _ in 0..25 {
        backend.set_joint_position_target(body, 2, 0.8, 15.0, 3.0)?;
        backend.step_integration()?;
    }
    assert!(backend.pose(body)?.position.is_finite());
    assert!(backend.joint_state(body, 2)?.position.is_finite());
    Ok(())
}

#[test]
fn unknown_handles_are_reported() -> anyhow::Result<()> {
    let (backend, body) = world(true)?;
    assert!(matches!(
        backend.joint_state(body, 4),
        Err(BackendError::UnknownJoint { joint: 4, .. })
    ));
    assert!(matches!(
        backend.pose(BodyHandle(7)),
        Err(BackendError::UnknownBody(BodyHandle(7)))
    ));
    Ok(())
}

#[test]
fn invalid_commands_are_rejected() -> anyhow::Result<()> {
    let (mut backend, body) = world(true)?;
    assert!(matches!(
        backend.set_joint_position_target(body, 0, f32::INFINITY, 20.0, 4.0),
        Err(BackendError::InvalidParameter(_))
    ));
    let zero_iterations = IntegrationParams {
        solver_iterations: 0,
        ..params()
    };
    assert!(backend.configure_integration(zero_iterations).is_err());
    Ok(())
}

#[test]
fn disconnect_is_idempotent_and_invalidates_the_connection() -> anyhow::Result<()> {
    let (mut backend, body) = world(true)?;
    backend.disconnect();
    backend.disconnect();
    assert!(!backend.is_connected());
    assert!(matches!(backend.pose(body), Err(BackendError::NotConnected)));
    assert!(matches!(backend.step_integration(), Err(BackendError::NotConnected)));
    assert!(matches!(
        backend.load_body(Path::new(STRIDER)),
        Err(BackendError::NotConnected)
    ));
    Ok(())
}
