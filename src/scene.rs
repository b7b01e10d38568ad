//! The haunted house.
//!
//! [`HauntedHouse`] assembles the floor, the house group (walls, roof, door,
//! bushes), the graves and the lights once, then animates the ghost lights
//! every frame. Graves are scattered with an injectable RNG so a seed
//! reproduces a layout.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use cgmath::{EuclideanSpace, Point3, Vector3};
use instant::Duration;
use rand::{Rng, SeedableRng, rngs::StdRng};
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
    keyboard::Key,
};

use crate::{
    config::{GhostSettings, GraveRing, SceneConfig},
    context::{Context, InitContext},
    data_structures::{
        geometry,
        instance::Instance,
        model::{Model, MaterialUniform, flags},
        scene_graph::{ContainerNode, ModelNode, SceneNode},
        texture::{SamplerSettings, Wrap},
    },
    flow::{FlowConstructor, GraphicsFlow, Out},
    pipelines::{
        light::PointLightRaw,
        shadow::MAX_SHADOWED_POINT_LIGHTS,
    },
    render::Render,
    resources::{
        Assets,
        texture::{ArmSource, TextureSet, load_material},
    },
};

pub const FLOOR_TEXTURES: TextureSet = TextureSet {
    color: "floor/coast_sand_rocks_02_1k/coast_sand_rocks_02_diff_1k.webp",
    arm: ArmSource::Packed("floor/coast_sand_rocks_02_1k/coast_sand_rocks_02_arm_1k.webp"),
    normal: "floor/coast_sand_rocks_02_1k/coast_sand_rocks_02_nor_gl_1k.webp",
    alpha: Some("floor/alpha.webp"),
    displacement: Some("floor/coast_sand_rocks_02_1k/coast_sand_rocks_02_disp_1k.webp"),
    repeat: [8.0, 8.0],
    sampler: SamplerSettings::REPEAT,
};

pub const WALL_TEXTURES: TextureSet = TextureSet {
    color: "wall/castle_brick_broken_06_1k/castle_brick_broken_06_diff_1k.webp",
    arm: ArmSource::Packed("wall/castle_brick_broken_06_1k/castle_brick_broken_06_arm_1k.webp"),
    normal: "wall/castle_brick_broken_06_1k/castle_brick_broken_06_nor_gl_1k.webp",
    alpha: None,
    displacement: None,
    repeat: [1.0, 1.0],
    sampler: SamplerSettings {
        wrap_s: Wrap::Clamp,
        wrap_t: Wrap::Clamp,
    },
};

pub const ROOF_TEXTURES: TextureSet = TextureSet {
    color: "roof/roof_slates_02_1k/roof_slates_02_diff_1k.webp",
    arm: ArmSource::Packed("roof/roof_slates_02_1k/roof_slates_02_arm_1k.webp"),
    normal: "roof/roof_slates_02_1k/roof_slates_02_nor_gl_1k.webp",
    alpha: None,
    displacement: None,
    repeat: [3.0, 1.0],
    sampler: SamplerSettings {
        wrap_s: Wrap::Repeat,
        wrap_t: Wrap::Clamp,
    },
};

pub const BUSH_TEXTURES: TextureSet = TextureSet {
    color: "bush/leaves_forest_ground_1k/leaves_forest_ground_diff_1k.webp",
    arm: ArmSource::Packed("bush/leaves_forest_ground_1k/leaves_forest_ground_arm_1k.webp"),
    normal: "bush/leaves_forest_ground_1k/leaves_forest_ground_nor_gl_1k.webp",
    alpha: None,
    displacement: None,
    repeat: [2.0, 1.0],
    sampler: SamplerSettings {
        wrap_s: Wrap::Repeat,
        wrap_t: Wrap::Clamp,
    },
};

pub const GRAVE_TEXTURES: TextureSet = TextureSet {
    color: "grave/plastered_stone_wall_1k/plastered_stone_wall_diff_1k.webp",
    arm: ArmSource::Packed("grave/plastered_stone_wall_1k/plastered_stone_wall_arm_1k.webp"),
    normal: "grave/plastered_stone_wall_1k/plastered_stone_wall_nor_gl_1k.webp",
    alpha: None,
    displacement: None,
    repeat: [0.3, 0.4],
    sampler: SamplerSettings {
        wrap_s: Wrap::Clamp,
        wrap_t: Wrap::Clamp,
    },
};

pub const DOOR_TEXTURES: TextureSet = TextureSet {
    color: "door/color.webp",
    arm: ArmSource::Separate {
        ao: "door/ambientOcclusion.webp",
        roughness: "door/roughness.webp",
        metalness: "door/metalness.webp",
    },
    normal: "door/normal.webp",
    alpha: Some("door/alpha.webp"),
    displacement: Some("door/height.webp"),
    repeat: [1.0, 1.0],
    sampler: SamplerSettings {
        wrap_s: Wrap::Clamp,
        wrap_t: Wrap::Clamp,
    },
};

const DISPLACEMENT_STEP: f32 = 0.01;

/// Applies a floor displacement key: `[`/`]` step the scale within `[0, 1]`,
/// `-`/`=` step the bias within `[-1, 1]`. Returns whether `key` was one of them.
pub fn tweak_displacement(uniform: &mut MaterialUniform, key: &str) -> bool {
    let (value, step, min) = match key {
        "[" => (&mut uniform.displacement_scale, -DISPLACEMENT_STEP, 0.0),
        "]" => (&mut uniform.displacement_scale, DISPLACEMENT_STEP, 0.0),
        "-" => (&mut uniform.displacement_bias, -DISPLACEMENT_STEP, -1.0),
        "=" => (&mut uniform.displacement_bias, DISPLACEMENT_STEP, -1.0),
        _ => return false,
    };
    *value = (*value + step).clamp(min, 1.0);
    true
}

/// Scatters `ring.count` graves in the annulus between the ring's radii.
///
/// Each grave sits at a random height up to half its own height and leans by
/// at most 1/8 rad around every axis.
pub fn place_graves<R: Rng>(rng: &mut R, ring: &GraveRing, grave_height: f32) -> Vec<Instance> {
    (0..ring.count)
        .map(|_| {
            let angle = rng.random::<f32>() * TAU;
            let radius = rng.random::<f32>() * (ring.max_radius - ring.min_radius) + ring.min_radius;
            let position = Vector3::new(
                angle.sin() * radius,
                rng.random::<f32>() * grave_height / 2.0,
                angle.cos() * radius,
            );
            let mut lean = || (rng.random::<f32>() - 0.5) / 4.0;
            let (x, y, z) = (lean(), lean(), lean());
            Instance::new().with_position(position).with_euler(x, y, z)
        })
        .collect()
}

/// Where a ghost circling at `radius` with angular `speed` is after `elapsed` seconds.
///
/// The height bobs within `[-1, 1]`.
pub fn ghost_position(elapsed: f32, speed: f32, radius: f32) -> Vector3<f32> {
    let angle = elapsed * speed;
    Vector3::new(
        angle.cos() * radius,
        angle.sin() * (angle * 2.34).sin() * (angle * 3.45).sin(),
        angle.sin() * radius,
    )
}

fn bush_instances() -> Vec<Instance> {
    [
        (0.5, [0.8, 0.2, 2.2]),
        (0.25, [1.4, 0.1, 2.1]),
        (0.4, [-0.8, 0.1, 2.2]),
        (0.15, [-1.0, 0.05, 2.6]),
    ]
    .into_iter()
    .map(|(scale, position)| {
        Instance::new()
            .with_position(position.into())
            .with_uniform_scale(scale)
            .with_euler(-0.75, 0.0, 0.0)
    })
    .collect()
}

fn receiving(mut uniform: MaterialUniform) -> MaterialUniform {
    uniform.flags |= flags::RECEIVE_SHADOW;
    uniform
}

struct Ghost {
    settings: GhostSettings,
    slot: usize,
    shadow: Option<usize>,
}

pub struct HauntedHouse {
    config: SceneConfig,
    rng: StdRng,
    floor: ModelNode,
    house: ContainerNode,
    graves: ModelNode,
    ghosts: Vec<Ghost>,
    elapsed: f32,
    frames_since_tick: u32,
    buffers_dirty: bool,
}

impl HauntedHouse {
    pub async fn new(init: InitContext, config: SceneConfig, assets: Assets, rng: StdRng) -> anyhow::Result<Self> {
        let device = &init.device;
        log::info!("loading textures from {}", assets.root());

        let floor_uniform = receiving(MaterialUniform {
            displacement_scale: config.floor.displacement_scale,
            displacement_bias: config.floor.displacement_bias,
            ..Default::default()
        });
        let door_uniform = MaterialUniform {
            displacement_scale: config.door.displacement_scale,
            displacement_bias: config.door.displacement_bias,
            ..Default::default()
        };
        let tint = config.bushes.tint.to_linear();
        let bush_uniform = MaterialUniform {
            tint: [tint[0], tint[1], tint[2], 1.0],
            ..Default::default()
        };

        let (floor_material, wall_material, roof_material, door_material, bush_material, grave_material) = futures::join!(
            load_material(&init, &assets, "floor", &FLOOR_TEXTURES, floor_uniform),
            load_material(&init, &assets, "walls", &WALL_TEXTURES, receiving(MaterialUniform::default())),
            load_material(&init, &assets, "roof", &ROOF_TEXTURES, MaterialUniform::default()),
            load_material(&init, &assets, "door", &DOOR_TEXTURES, door_uniform),
            load_material(&init, &assets, "bushes", &BUSH_TEXTURES, bush_uniform),
            load_material(&init, &assets, "graves", &GRAVE_TEXTURES, receiving(MaterialUniform::default())),
        );

        let floor_geometry = geometry::plane(
            config.floor.size,
            config.floor.size,
            config.floor.segments,
            config.floor.segments,
        );
        let mut floor =
            ModelNode::from_model(1, device, Model::from_geometry(device, "floor", &floor_geometry, floor_material))
                .transparent();
        floor.set_local_transform(0, Instance::new().with_euler(-FRAC_PI_2, 0.0, 0.0));

        let house_size = &config.house;
        let walls_geometry = geometry::cuboid(house_size.width, house_size.height, house_size.depth);
        let mut walls =
            ModelNode::from_model(1, device, Model::from_geometry(device, "walls", &walls_geometry, wall_material))
                .casting_shadows();
        walls.set_local_transform(0, Vector3::new(0.0, house_size.height / 2.0, 0.0).into());

        let roof_geometry = geometry::cone(config.roof.radius, config.roof.height, config.roof.radial_segments);
        let mut roof =
            ModelNode::from_model(1, device, Model::from_geometry(device, "roof", &roof_geometry, roof_material))
                .casting_shadows();
        roof.set_local_transform(
            0,
            Instance::new()
                .with_position(Vector3::new(0.0, house_size.height + config.roof.height / 2.0, 0.0))
                .with_euler(0.0, FRAC_PI_4, 0.0),
        );

        let door_geometry = geometry::plane(
            config.door.width,
            config.door.height,
            config.door.width_segments,
            config.door.height_segments,
        );
        let mut door =
            ModelNode::from_model(1, device, Model::from_geometry(device, "door", &door_geometry, door_material))
                .transparent();
        door.set_local_transform(
            0,
            Vector3::new(0.0, config.door.height / 2.0 - 0.1, house_size.depth / 2.0 + 0.01).into(),
        );

        let bush_geometry = geometry::sphere(
            config.bushes.radius,
            config.bushes.width_segments,
            config.bushes.height_segments,
        );
        let bush_placements = bush_instances();
        let mut bushes = ModelNode::from_model(
            bush_placements.len(),
            device,
            Model::from_geometry(device, "bushes", &bush_geometry, bush_material),
        );
        bushes.set_instances(bush_placements);

        let mut house = ContainerNode::new(1);
        house.add_child(Box::new(walls));
        house.add_child(Box::new(roof));
        house.add_child(Box::new(door));
        house.add_child(Box::new(bushes));

        let grave_size = &config.graves;
        let grave_geometry = geometry::cuboid(grave_size.width, grave_size.height, grave_size.depth);
        let graves = ModelNode::from_model(
            config.grave_ring.count as usize,
            device,
            Model::from_geometry(device, "graves", &grave_geometry, grave_material),
        )
        .casting_shadows();

        let mut scene = Self {
            config,
            rng,
            floor,
            house,
            graves,
            ghosts: Vec::new(),
            elapsed: 0.0,
            frames_since_tick: 0,
            buffers_dirty: true,
        };
        scene.reroll_graves();
        scene.floor.update_world_transform_all();
        scene.house.update_world_transform_all();
        scene.write_buffers(&init.queue, &init.device);
        log::info!("haunted house assembled with {} graves", scene.graves.instance_count());
        Ok(scene)
    }

    /// Scatters the graves anew.
    pub fn reroll_graves(&mut self) {
        let placements = place_graves(&mut self.rng, &self.config.grave_ring, self.config.graves.height);
        self.graves.set_instances(placements);
        self.graves.update_world_transform_all();
        self.buffers_dirty = true;
    }

    pub fn graves(&self) -> &ModelNode {
        &self.graves
    }

    pub fn house(&self) -> &ContainerNode {
        &self.house
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn write_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) {
        if !self.buffers_dirty {
            return;
        }
        self.floor.write_to_buffers(queue, device);
        self.house.write_to_buffers(queue, device);
        self.graves.write_to_buffers(queue, device);
        self.buffers_dirty = false;
    }

    /// The door light hangs on the house group.
    fn door_light_position(&self) -> Vector3<f32> {
        let house = self.house.get_world_transforms().first().copied().unwrap_or_default();
        (&house * &Instance::from(Vector3::from(self.config.lighting.door.position))).position
    }

    fn tweak_floor(&mut self, key: &str) {
        let Some(material) = self.floor.material_mut(0) else {
            return;
        };
        if tweak_displacement(&mut material.uniform, key) {
            log::info!(
                "floor displacement scale {:.3}, bias {:.3}",
                material.uniform.displacement_scale,
                material.uniform.displacement_bias
            );
            self.buffers_dirty = true;
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) {
        if key.state != ElementState::Pressed {
            return;
        }
        let Key::Character(c) = &key.logical_key else {
            return;
        };
        match c.as_str() {
            "r" | "R" if !key.repeat => {
                self.reroll_graves();
                log::info!("graves re-rolled");
            }
            key => self.tweak_floor(key),
        }
    }
}

impl<S, E> GraphicsFlow<S, E> for HauntedHouse {
    fn on_init(&mut self, ctx: &mut Context, _: &mut S) -> Out<S, E> {
        let door = &self.config.lighting.door;
        let door_light = PointLightRaw {
            position: self.door_light_position().into(),
            intensity: door.intensity,
            color: door.color.to_linear(),
            shadow_index: -1,
        };
        if ctx.light.uniform.push_point_light(door_light).is_none() {
            log::warn!("no point light slot left for the door light");
        }

        self.ghosts.clear();
        for (i, settings) in self.config.lighting.ghosts.iter().enumerate() {
            let position = ghost_position(0.0, settings.speed, settings.radius);
            let shadow = (i < MAX_SHADOWED_POINT_LIGHTS).then_some(i);
            let light = PointLightRaw {
                position: position.into(),
                intensity: settings.intensity,
                color: settings.color.to_linear(),
                shadow_index: shadow.map_or(-1, |s| s as i32),
            };
            let Some(slot) = ctx.light.uniform.push_point_light(light) else {
                log::warn!("no point light slot left for ghost {i}");
                continue;
            };
            if let Some(shadow) = shadow {
                ctx.shadows.set_point(shadow, Point3::from_vec(position));
            }
            self.ghosts.push(Ghost {
                settings: settings.clone(),
                slot,
                shadow,
            });
        }
        log::info!(
            "{} point lights, {} ghosts",
            ctx.light.uniform.point_lights().len(),
            self.ghosts.len()
        );
        Out::Empty
    }

    fn on_update(&mut self, ctx: &Context, _: &mut S, dt: Duration) -> Out<S, E> {
        self.elapsed += dt.as_secs_f32();
        self.frames_since_tick += 1;
        self.write_buffers(&ctx.queue, &ctx.device);

        let elapsed = self.elapsed;
        let moves: Vec<_> = self
            .ghosts
            .iter()
            .map(|ghost| {
                let position = ghost_position(elapsed, ghost.settings.speed, ghost.settings.radius);
                (ghost.slot, ghost.shadow, position)
            })
            .collect();
        Out::Configure(Box::new(move |ctx: &mut Context| {
            for (slot, shadow, position) in moves {
                ctx.light.uniform.set_point_position(slot, position);
                if let Some(shadow) = shadow {
                    ctx.shadows.set_point(shadow, Point3::from_vec(position));
                }
            }
        }))
    }

    fn on_tick(&mut self, ctx: &Context, _: &mut S) -> Out<S, E> {
        let seconds = ctx.tick_duration_millis as f32 / 1000.0;
        log::debug!("{:.1} fps", self.frames_since_tick as f32 / seconds);
        self.frames_since_tick = 0;
        Out::Empty
    }

    fn on_device_events(&mut self, _: &Context, _: &mut S, _: &DeviceEvent) -> Out<S, E> {
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut S, event: &WindowEvent) -> Out<S, E> {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            self.handle_key(event);
        }
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, _: &mut S, event: E) -> Option<E> {
        Some(event)
    }

    fn on_render<'pass>(&self) -> Render<'_, 'pass> {
        Render::Composed(vec![
            (&self.floor as &dyn SceneNode).into(),
            (&self.house as &dyn SceneNode).into(),
            (&self.graves as &dyn SceneNode).into(),
        ])
    }

    // The scene has no expectations of its own; tests wrap it.
    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        _: &Context,
        _: &mut S,
        _: &mut image::RgbaImage,
    ) -> anyhow::Result<crate::flow::ImageTestResult> {
        Ok(crate::flow::ImageTestResult::Passed)
    }
}

/// Builds the scene once the GPU is ready. Without a seed the graves are
/// placed from OS entropy.
pub fn constructor<S: 'static, E: 'static>(
    config: SceneConfig,
    assets: Assets,
    seed: Option<u64>,
) -> FlowConstructor<S, E> {
    Box::new(move |init: InitContext| {
        Box::pin(async move {
            let rng = match seed {
                Some(seed) => {
                    log::info!("placing graves with seed {seed}");
                    StdRng::seed_from_u64(seed)
                }
                None => StdRng::from_os_rng(),
            };
            let scene = HauntedHouse::new(init, config, assets, rng).await?;
            let flow: Box<dyn GraphicsFlow<S, E>> = Box::new(scene);
            anyhow::Ok(flow)
        })
    })
}

/// Opens the window and runs the haunted house until it is closed.
pub fn launch(config: SceneConfig, assets: Assets, seed: Option<u64>) -> anyhow::Result<()> {
    config.validate()?;
    crate::flow::run::<(), ()>(config.clone(), vec![constructor(config, assets, seed)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn graves_stay_in_the_annulus() {
        let ring = GraveRing::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let graves = place_graves(&mut rng, &ring, 0.8);
            assert_eq!(graves.len(), ring.count as usize);
            for grave in graves {
                let planar = (grave.position.x.powi(2) + grave.position.z.powi(2)).sqrt();
                assert!(planar >= ring.min_radius - 1e-4 && planar <= ring.max_radius + 1e-4, "{planar}");
                assert!((0.0..=0.4).contains(&grave.position.y));
            }
        }
    }

    #[test]
    fn graves_lean_at_most_an_eighth_radian() {
        let mut rng = StdRng::seed_from_u64(3);
        for grave in place_graves(&mut rng, &GraveRing::default(), 0.8) {
            let up = grave.rotation * Vector3::unit_y();
            // each of the three Euler angles is below 1/8, so the tilt stays well below 1/4
            assert!(up.angle(Vector3::unit_y()).0 < 0.25);
        }
    }

    #[test]
    fn rerolling_moves_the_graves_but_keeps_the_annulus() {
        let ring = GraveRing::default();
        let mut rng = StdRng::seed_from_u64(11);
        let first = place_graves(&mut rng, &ring, 0.8);
        let second = place_graves(&mut rng, &ring, 0.8);
        assert_eq!(first.len(), second.len());
        assert_ne!(first, second);
        for grave in second {
            let planar = (grave.position.x.powi(2) + grave.position.z.powi(2)).sqrt();
            assert!(planar >= ring.min_radius - 1e-4 && planar <= ring.max_radius + 1e-4, "{planar}");
        }
    }

    #[test]
    fn displacement_scale_stays_within_unit_range() {
        let mut uniform = MaterialUniform {
            displacement_scale: 0.0,
            ..Default::default()
        };
        assert!(tweak_displacement(&mut uniform, "["));
        assert_eq!(uniform.displacement_scale, 0.0);
        assert!(tweak_displacement(&mut uniform, "]"));
        assert!((uniform.displacement_scale - DISPLACEMENT_STEP).abs() < 1e-6);

        uniform.displacement_scale = 0.995;
        assert!(tweak_displacement(&mut uniform, "]"));
        assert_eq!(uniform.displacement_scale, 1.0);
        assert!(tweak_displacement(&mut uniform, "]"));
        assert_eq!(uniform.displacement_scale, 1.0);
    }

    #[test]
    fn displacement_bias_stays_within_signed_unit_range() {
        let mut uniform = MaterialUniform {
            displacement_bias: -0.995,
            ..Default::default()
        };
        assert!(tweak_displacement(&mut uniform, "-"));
        assert_eq!(uniform.displacement_bias, -1.0);
        assert!(tweak_displacement(&mut uniform, "-"));
        assert_eq!(uniform.displacement_bias, -1.0);

        uniform.displacement_bias = 1.0;
        assert!(tweak_displacement(&mut uniform, "="));
        assert_eq!(uniform.displacement_bias, 1.0);
        assert!(tweak_displacement(&mut uniform, "-"));
        assert!((uniform.displacement_bias - (1.0 - DISPLACEMENT_STEP)).abs() < 1e-6);
    }

    #[test]
    fn other_keys_leave_the_floor_alone() {
        let mut uniform = MaterialUniform {
            displacement_scale: 0.3,
            displacement_bias: -0.2,
            ..Default::default()
        };
        let before = uniform;
        for key in ["r", "x", "+", ""] {
            assert!(!tweak_displacement(&mut uniform, key));
        }
        assert_eq!(uniform, before);
    }

    #[test]
    fn a_seed_reproduces_the_layout() {
        let ring = GraveRing::default();
        let a = place_graves(&mut StdRng::seed_from_u64(42), &ring, 0.8);
        let b = place_graves(&mut StdRng::seed_from_u64(42), &ring, 0.8);
        let c = place_graves(&mut StdRng::seed_from_u64(43), &ring, 0.8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn degenerate_ring_places_on_the_circle() {
        let ring = GraveRing {
            count: 5,
            min_radius: 3.0,
            max_radius: 3.0,
        };
        for grave in place_graves(&mut StdRng::seed_from_u64(1), &ring, 1.0) {
            let planar = (grave.position.x.powi(2) + grave.position.z.powi(2)).sqrt();
            assert!((planar - 3.0).abs() < 1e-4);
        }
        let empty = GraveRing { count: 0, ..ring };
        assert!(place_graves(&mut StdRng::seed_from_u64(1), &empty, 1.0).is_empty());
    }

    #[test]
    fn ghosts_circle_at_their_radius_and_bob_within_one() {
        for ghost in SceneConfig::default().lighting.ghosts {
            for step in 0..2000 {
                let t = step as f32 * 0.37;
                let p = ghost_position(t, ghost.speed, ghost.radius);
                let planar = (p.x * p.x + p.z * p.z).sqrt();
                assert!((planar - ghost.radius).abs() < 1e-3);
                assert!(p.y.abs() <= 1.0);
            }
        }
    }

    #[test]
    fn ghost_paths_are_continuous() {
        let dt = 1e-3;
        for ghost in SceneConfig::default().lighting.ghosts {
            for step in 0..500 {
                let t = step as f32 * 0.1;
                let jump = ghost_position(t + dt, ghost.speed, ghost.radius) - ghost_position(t, ghost.speed, ghost.radius);
                // speed * radius bounds the planar velocity, the bob adds a few units per second
                assert!(jump.magnitude() < dt * (ghost.speed.abs() * ghost.radius + 10.0));
            }
        }
    }

    #[test]
    fn ghosts_start_on_the_positive_x_axis() {
        let p = ghost_position(0.0, 0.5, 4.0);
        assert!((p - Vector3::new(4.0, 0.0, 0.0)).magnitude() < 1e-6);
    }

    #[test]
    fn bushes_sit_in_front_of_the_door() {
        let bushes = bush_instances();
        assert_eq!(bushes.len(), 4);
        assert!(bushes.iter().all(|b| b.position.z > 2.0));
        assert_eq!(bushes[0].scale, Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(bushes[3].position, Vector3::new(-1.0, 0.05, 2.6));
    }
}
