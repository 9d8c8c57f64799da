use bevy::{
    input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel},
    prelude::*,
};

pub struct OrbitCameraPlugin;

impl Plugin for OrbitCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, camera_system);
    }
}

/// Settings component placed on the camera entity to enable orbit controls.
///
/// Controls:
/// - Right-click + drag: orbit around the focus point
/// - Middle-click + drag: pan the focus point in the view plane
/// - Scroll wheel: dolly toward / away from the focus point
#[derive(Component)]
pub struct OrbitCameraSettings {
    /// Point the camera orbits around.
    pub focus: Vec3,
    /// Orbit sensitivity (radians per pixel).
    pub sensitivity: f32,
    /// Pan speed (world units per pixel at distance 1).
    pub pan_speed: f32,
    /// Dolly speed (fraction of current distance per scroll line).
    pub zoom_speed: f32,
    /// Closest the camera may dolly to the focus point.
    pub min_distance: f32,
    /// Farthest the camera may dolly from the focus point.
    pub max_distance: f32,
    /// Whether camera controls are enabled. Cleared while a tile drag is active.
    pub enabled: bool,
}

impl Default for OrbitCameraSettings {
    fn default() -> Self {
        Self {
            focus: Vec3::ZERO,
            sensitivity: 0.004,
            pan_speed: 0.0015,
            zoom_speed: 0.1,
            min_distance: 2.0,
            max_distance: 120.0,
            enabled: true,
        }
    }
}

fn camera_system(
    mouse: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut scroll_events: MessageReader<MouseWheel>,
    mut camera_query: Query<(&mut OrbitCameraSettings, &mut Transform)>,
) {
    for (mut settings, mut transform) in &mut camera_query {
        if !settings.enabled {
            mouse_motion.read().count();
            scroll_events.read().count();
            continue;
        }

        let right_held = mouse.pressed(MouseButton::Right);
        let middle_held = mouse.pressed(MouseButton::Middle);

        let mut mouse_delta = Vec2::ZERO;
        if right_held || middle_held {
            for motion in mouse_motion.read() {
                mouse_delta += motion.delta;
            }
        } else {
            mouse_motion.read().count();
        }

        let mut offset = transform.translation - settings.focus;
        let mut distance = offset.length().max(settings.min_distance);

        // Orbit: yaw about world Y, pitch about the camera's right axis.
        if right_held && mouse_delta != Vec2::ZERO {
            let yaw = Quat::from_rotation_y(-mouse_delta.x * settings.sensitivity);
            offset = yaw * offset;

            let right = transform.right().as_vec3();
            let pitch = Quat::from_axis_angle(right, -mouse_delta.y * settings.sensitivity);
            let pitched = pitch * offset;
            // Keep the view off the poles so look_at stays stable
            if pitched.normalize_or_zero().dot(Vec3::Y).abs() < 0.99 {
                offset = pitched;
            }
        }

        // Pan: slide the focus point in the view plane
        if middle_held && !right_held && mouse_delta != Vec2::ZERO {
            let right = transform.right().as_vec3();
            let up = transform.up().as_vec3();
            let pan = (-right * mouse_delta.x + up * mouse_delta.y)
                * settings.pan_speed
                * distance;
            settings.focus += pan;
        }

        // Scroll wheel: dolly along the view direction
        for event in scroll_events.read() {
            let delta = match event.unit {
                MouseScrollUnit::Line => event.y,
                MouseScrollUnit::Pixel => event.y * 0.01,
            };
            distance = (distance * (1.0 - delta * settings.zoom_speed))
                .clamp(settings.min_distance, settings.max_distance);
        }

        let direction = offset.normalize_or_zero();
        let direction = if direction == Vec3::ZERO {
            Vec3::new(0.0, 0.7, 0.7).normalize()
        } else {
            direction
        };
        let focus = settings.focus;
        transform.translation = focus + direction * distance;
        transform.look_at(focus, Vec3::Y);
    }
}
