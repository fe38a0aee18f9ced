//! Viewer application: scene setup and per-frame recording.

use std::f32::consts::{PI, TAU};
use std::fs::File;
use std::path::PathBuf;

use anyhow::Context as _;
use ash::vk;
use glam::{Quat, Vec3};
use lumen_app::{AppContext, KeyboardController, LumenApp};
use lumen_core::ObjectId;
use lumen_render::{Camera, FrameContext, GeometrySystem, GlobalUbo, PointLightSystem};
use lumen_scene::Scene;
use tracing::info;
use winit::event::WindowEvent;

const FOV_Y: f32 = 50.0 * PI / 180.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

const LIGHT_COLORS: [Vec3; 6] = [
    Vec3::new(1.0, 0.1, 0.1),
    Vec3::new(0.1, 0.1, 1.0),
    Vec3::new(0.1, 1.0, 0.1),
    Vec3::new(1.0, 1.0, 0.1),
    Vec3::new(0.1, 1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

pub struct ViewerApp {
    scene: Scene,
    camera: Camera,
    viewer_id: ObjectId,
    controller: KeyboardController,
    geometry: GeometrySystem,
    point_lights: PointLightSystem,
}

/// Load a precompiled SPIR-V shader from the viewer's shaders directory.
fn load_spirv(name: &str) -> anyhow::Result<Vec<u32>> {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "shaders", name]
        .iter()
        .collect();
    let mut file = File::open(&path).with_context(|| {
        format!(
            "missing shader {} (compile the GLSL sources with glslc first)",
            path.display()
        )
    })?;
    let words = ash::util::read_spv(&mut file)
        .with_context(|| format!("invalid SPIR-V in {}", path.display()))?;
    Ok(words)
}

fn build_scene(ctx: &mut AppContext) -> anyhow::Result<(Scene, ObjectId)> {
    let mut scene = Scene::new();

    let cube = ctx.meshes.register(&ctx.gpu, &crate::meshes::cube())?;
    let floor = ctx.meshes.register(&ctx.gpu, &crate::meshes::floor_quad())?;

    let object = scene.spawn_mesh(cube);
    object.transform.set_translation(Vec3::new(0.0, 0.0, 0.0));
    object.transform.set_uniform_scale(0.75);

    let object = scene.spawn_mesh(floor);
    object.transform.set_translation(Vec3::new(0.0, 0.5, 0.0));
    object.transform.set_scale(Vec3::new(3.0, 1.0, 3.0));

    for (i, color) in LIGHT_COLORS.iter().enumerate() {
        let angle = i as f32 * TAU / LIGHT_COLORS.len() as f32;
        let rotation = Quat::from_axis_angle(Vec3::new(0.0, -1.0, 0.0), angle);
        let light = scene.spawn_point_light(0.2, 0.1, *color);
        light
            .transform
            .set_translation(rotation * Vec3::new(-1.0, -1.0, -1.0));
    }

    // Camera rig: a bare object the keyboard controller steers
    let viewer = scene.spawn();
    viewer.transform.set_translation(Vec3::new(0.0, 0.0, -2.5));
    let viewer_id = viewer.id();

    Ok((scene, viewer_id))
}

impl LumenApp for ViewerApp {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let render_pass = ctx.render_pass();
        let layout = ctx.global_set_layout();

        let geometry = GeometrySystem::new(
            &ctx.gpu,
            render_pass,
            layout,
            load_spirv("geometry.vert.spv")?,
            load_spirv("geometry.frag.spv")?,
        )?;
        let point_lights = PointLightSystem::new(
            &ctx.gpu,
            render_pass,
            layout,
            load_spirv("point_light.vert.spv")?,
            load_spirv("point_light.frag.spv")?,
        )?;

        let (scene, viewer_id) = build_scene(ctx)?;
        info!("Scene ready: {} objects", scene.len());

        Ok(Self {
            scene,
            camera: Camera::new(),
            viewer_id,
            controller: KeyboardController::new(),
            geometry,
            point_lights,
        })
    }

    fn update(&mut self, ctx: &mut AppContext, dt: f32) {
        if let Some(viewer) = self.scene.get_mut(self.viewer_id) {
            self.controller.move_in_plane_xz(dt, viewer);
            self.camera.set_view_yxz(
                viewer.transform.translation(),
                self.controller.rotation(),
            );
        }
        self.camera
            .set_perspective_projection(FOV_Y, ctx.scheduler.aspect_ratio(), NEAR, FAR);
    }

    fn render(
        &mut self,
        ctx: &mut AppContext,
        cmd: vk::CommandBuffer,
        dt: f32,
    ) -> anyhow::Result<()> {
        let slot = ctx.scheduler.frame_index();

        let mut ubo = GlobalUbo {
            projection: self.camera.projection(),
            view: self.camera.view(),
            inverse_view: self.camera.inverse_view(),
            ..GlobalUbo::default()
        };
        self.point_lights.update(&mut self.scene, dt, &mut ubo);
        ctx.write_global_ubo(slot, &ubo)?;

        let frame = FrameContext {
            frame_index: slot,
            frame_time: dt,
            command_buffer: cmd,
            camera: &self.camera,
            global_descriptor_set: ctx.global_set(slot),
            scene: &self.scene,
        };

        ctx.scheduler.begin_render_pass(cmd);
        unsafe {
            self.geometry.render(&ctx.gpu, &frame, &ctx.meshes);
            self.point_lights.render(&ctx.gpu, &frame);
        }
        ctx.scheduler.end_render_pass(cmd);

        Ok(())
    }

    fn on_event(&mut self, event: &WindowEvent) -> bool {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            self.controller.process_key_event(event);
        }
        false
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        unsafe {
            self.geometry.destroy(&ctx.gpu);
            self.point_lights.destroy(&ctx.gpu);
        }
    }
}
