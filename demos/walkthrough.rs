//! Walk around a brick floor scattered with crates under a skybox
//!
//! Expects textures under `resources/textures` and skybox faces under
//! `resources/skybox` unless `umbra.toml` points elsewhere. WASD to move,
//! mouse to look, Escape to quit.

use std::f32::consts::TAU;

use anyhow::Context;
use umbra::prelude::*;

fn main() -> anyhow::Result<()> {
    init_logging();
    let config = EngineConfig::load_or_default("umbra.toml").context("failed to read umbra.toml")?;

    UmbraApp::new(config)?.with_setup(build_scene).run()
}

fn build_scene(ctx: &mut SceneContext) -> anyhow::Result<()> {
    let floor_material = Material::shared(
        ctx.textures,
        ctx.device,
        &MaterialDescriptor::new("brickwall.jpg")
            .with_name("brick")
            .with_normal("brickwall_normal.jpg")
            .with_shininess(16.0),
    )?;
    let crate_material = Material::shared(
        ctx.textures,
        ctx.device,
        &MaterialDescriptor::new("container.png")
            .with_name("crate")
            .with_specular("container_specular.png"),
    )?;

    let floor = Model::from_meshes(
        ctx.device,
        "floor",
        vec![(generate_plane(40.0, 40.0, 8, 8), floor_material)],
    )?;
    ctx.scene.add_object(floor);

    let mut crates = Model::from_meshes(ctx.device, "crates", vec![(generate_cube(), crate_material)])?;
    let ring: Vec<InstanceTransform> = (0..8)
        .map(|i| {
            let angle = i as f32 / 8.0 * TAU;
            InstanceTransform::new(
                Vector3::new(6.0 * angle.cos(), 0.5, 6.0 * angle.sin()),
                Vector2::new(angle.to_degrees(), 0.0),
                Vector3::new(1.0, 1.0, 1.0),
            )
        })
        .collect();
    crates.set_transforms(ring);
    ctx.scene.add_object(crates);

    let skybox_root = ctx.config.resources.skybox.clone();
    match Skybox::load(ctx.device, &skybox_root, &SkyboxFaces::default()) {
        Ok(skybox) => ctx.scene.set_skybox(ctx.device, skybox),
        Err(error) => log::warn!("No skybox: {error}"),
    }

    ctx.scene.add_point_light(PointLight::at(Vector3::new(0.0, 3.0, 0.0)))?;
    let mut warm = PointLight::at(Vector3::new(-8.0, 2.0, -8.0));
    warm.diffuse = Vector3::new(1.0, 0.6, 0.3);
    ctx.scene.add_point_light(warm)?;

    ctx.scene.light_animation = Some(LightAnimation::Orbit {
        radius: 30.0,
        height: 60.0,
        angular_speed: 0.2,
    });
    Ok(())
}
