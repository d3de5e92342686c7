//! Scene state: the terrain, the flower arena, the hover disc and ambient
//! decoration, mirrored into a [`SceneGraph`] node by node.

pub mod ambient;
pub mod flower;
pub mod hover;
pub mod terrain;

use crate::assets::{AssetLoader, CancellationToken, ImageSource, LoadId, LoadedAsset};
use crate::geometry::{Hit, Ray, Raycast};
use crate::render::{Camera, NodeId, SceneGraph};
use ambient::Ambient;
use flower::Flower;
use glam::{Vec2, Vec3};
use hover::HoverIndicator;
use rand::rngs::StdRng;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use terrain::{Terrain, TerrainLayout, TerrainSource};

new_key_type! {
    /// Stable handle to a flower. Outlives the flower: lookups on a removed
    /// key simply miss.
    pub struct FlowerKey;
}

pub struct Scene {
    graph: Box<dyn SceneGraph>,
    assets: AssetLoader,
    flower_image: ImageSource,
    rng: StdRng,
    next_node: u64,
    terrain: Option<Terrain>,
    terrain_nodes: Vec<NodeId>,
    terrain_load: Option<(LoadId, CancellationToken)>,
    flowers: SlotMap<FlowerKey, Flower>,
    pending_flowers: HashMap<LoadId, FlowerKey>,
    hover: HoverIndicator,
    ambient: Option<Ambient>,
}

impl Scene {
    pub fn new(
        mut graph: Box<dyn SceneGraph>,
        assets: AssetLoader,
        flower_image: ImageSource,
        rng: StdRng,
    ) -> Self {
        let hover = HoverIndicator::new(NodeId(1));
        graph.add_node(hover.node(), hover.visual());
        Self {
            graph,
            assets,
            flower_image,
            rng,
            next_node: 1,
            terrain: None,
            terrain_nodes: Vec::new(),
            terrain_load: None,
            flowers: SlotMap::with_key(),
            pending_flowers: HashMap::new(),
            hover,
            ambient: None,
        }
    }

    pub fn graph(&self) -> &dyn SceneGraph {
        self.graph.as_ref()
    }

    fn allocate_node(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    /// Adds the cloud ring, drifting clouds and sun. Calling it again is a
    /// no-op.
    pub fn spawn_ambient(&mut self) {
        if self.ambient.is_some() {
            return;
        }
        let mut next = self.next_node;
        let ambient = Ambient::new(&mut self.rng, || {
            next += 1;
            NodeId(next)
        });
        self.next_node = next;
        for (node, visual) in ambient.nodes() {
            self.graph.add_node(node, visual);
        }
        self.ambient = Some(ambient);
    }

    pub fn ambient(&self) -> Option<&Ambient> {
        self.ambient.as_ref()
    }

    // Terrain

    /// Starts loading terrain; the current terrain (if any) stays in place
    /// until the new one arrives.
    pub fn load_terrain(&mut self, source: TerrainSource, layout: TerrainLayout) {
        if let Some((_, token)) = self.terrain_load.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        let id = self.assets.request_terrain(source, layout, token.clone());
        self.terrain_load = Some((id, token));
    }

    pub fn set_terrain(&mut self, terrain: Terrain) {
        for node in self.terrain_nodes.drain(..) {
            self.graph.remove_node(node);
        }
        for visual in terrain.visuals() {
            self.next_node += 1;
            let node = NodeId(self.next_node);
            self.graph.add_node(node, &visual);
            self.terrain_nodes.push(node);
        }
        log::info!("Terrain ready ({} tiles)", self.terrain_nodes.len());
        self.terrain = Some(terrain);
    }

    pub fn terrain(&self) -> Option<&Terrain> {
        self.terrain.as_ref()
    }

    /// Ground query against every terrain part. No terrain, no hit.
    pub fn raycast_terrain(&self, ray: &Ray) -> Option<Hit> {
        self.terrain.raycast(ray, true)
    }

    // Flowers

    pub fn flower(&self, key: FlowerKey) -> Option<&Flower> {
        self.flowers.get(key)
    }

    pub fn flowers(&self) -> impl Iterator<Item = (FlowerKey, &Flower)> {
        self.flowers.iter()
    }

    pub fn flower_count(&self) -> usize {
        self.flowers.len()
    }

    /// Plants a flower with the configured image and a random yaw.
    pub fn spawn_flower(&mut self, position: Vec3) -> FlowerKey {
        let node = self.allocate_node();
        let flower = Flower::with_random_yaw(self.flower_image.clone(), position, node, &mut self.rng);
        self.insert_flower(flower)
    }

    pub fn plant_flower(&mut self, source: ImageSource, position: Vec3, yaw_radians: f32) -> FlowerKey {
        let node = self.allocate_node();
        self.insert_flower(Flower::new(source, position, yaw_radians, node))
    }

    fn insert_flower(&mut self, flower: Flower) -> FlowerKey {
        let source = flower.source().clone();
        let key = self.flowers.insert(flower);
        let token = CancellationToken::new();
        let id = self.assets.request_image(source, token.clone());
        self.pending_flowers.insert(id, key);
        if let Some(flower) = self.flowers.get_mut(key) {
            flower.begin_load(id, token);
        }
        log::debug!("Planted flower {:?}", key);
        key
    }

    /// Removes the flower, its node and any load still in flight. Removing
    /// an absent key does nothing.
    pub fn remove_flower(&mut self, key: FlowerKey) -> bool {
        let Some(mut flower) = self.flowers.remove(key) else {
            return false;
        };
        if let Some(id) = flower.pending_load() {
            self.pending_flowers.remove(&id);
        }
        flower.cancel_load();
        self.graph.remove_node(flower.node());
        log::debug!("Removed flower {:?}", key);
        true
    }

    /// Loaded flowers whose base lies strictly within `radius` of `point` on
    /// the ground plane. Height is ignored. Flowers still waiting for their
    /// image have no surface yet and are never reached.
    pub fn flowers_within(&self, point: Vec3, radius: f32) -> Vec<FlowerKey> {
        let centre = Vec2::new(point.x, point.z);
        self.flowers
            .iter()
            .filter(|(_, flower)| flower.is_loaded())
            .filter(|(_, flower)| {
                let base = flower.base_position();
                Vec2::new(base.x, base.z).distance(centre) < radius
            })
            .map(|(key, _)| key)
            .collect()
    }

    /// Nearest loaded flower under `ray`.
    pub fn raycast_flowers(&self, ray: &Ray) -> Option<(FlowerKey, Hit)> {
        self.flowers
            .iter()
            .filter_map(|(key, flower)| flower.raycast(ray, false).map(|hit| (key, hit)))
            .min_by(|(_, a), (_, b)| a.distance.total_cmp(&b.distance))
    }

    pub fn set_flower_selected(&mut self, key: FlowerKey, selected: bool) -> bool {
        let Some(flower) = self.flowers.get_mut(key) else {
            return false;
        };
        if flower.set_selected(selected) {
            sync_flower(self.graph.as_mut(), flower);
        }
        true
    }

    pub fn clear_selection(&mut self) {
        for flower in self.flowers.values_mut() {
            if flower.set_selected(false) {
                sync_flower(self.graph.as_mut(), flower);
            }
        }
    }

    pub fn selected_flowers(&self) -> Vec<FlowerKey> {
        self.flowers
            .iter()
            .filter(|(_, flower)| flower.is_selected())
            .map(|(key, _)| key)
            .collect()
    }

    /// Returns the applied (clamped) scale.
    pub fn set_flower_scale(&mut self, key: FlowerKey, scale: f32) -> Option<f32> {
        let flower = self.flowers.get_mut(key)?;
        flower.set_scale(scale);
        sync_flower(self.graph.as_mut(), flower);
        Some(flower.scale())
    }

    /// Returns the applied (wrapped) rotation in degrees.
    pub fn set_flower_rotation(&mut self, key: FlowerKey, degrees: f32) -> Option<f32> {
        let flower = self.flowers.get_mut(key)?;
        flower.set_rotation_degrees(degrees);
        sync_flower(self.graph.as_mut(), flower);
        Some(flower.rotation_degrees())
    }

    // Hover indicator

    pub fn hover(&self) -> &HoverIndicator {
        &self.hover
    }

    pub fn show_hover(&mut self, hit: &Hit) {
        self.hover.show_at(hit);
        self.graph.update_node(self.hover.node(), self.hover.visual());
    }

    pub fn hide_hover(&mut self) {
        if self.hover.is_visible() {
            self.hover.hide();
            self.graph.update_node(self.hover.node(), self.hover.visual());
        }
    }

    // Per frame

    /// Applies finished loads. Loads for flowers erased in the meantime were
    /// cancelled and never show up here.
    pub fn poll_assets(&mut self) {
        for completion in self.assets.poll() {
            if let Some(key) = self.pending_flowers.remove(&completion.id) {
                let Some(flower) = self.flowers.get_mut(key) else {
                    continue;
                };
                flower.finish_load();
                let (width, height) = match completion.result {
                    Ok(LoadedAsset::Image { width, height }) => (width, height),
                    Ok(other) => {
                        log::warn!("Flower {:?} received a non-image asset: {:?}", key, other);
                        (1, 1)
                    }
                    Err(err) => {
                        log::warn!("Flower image failed to load, using a square: {}", err);
                        (1, 1)
                    }
                };
                let node = flower.node();
                let visual = flower.attach_image(width, height);
                self.graph.add_node(node, visual);
                continue;
            }

            let is_terrain = matches!(&self.terrain_load, Some((id, _)) if *id == completion.id);
            if !is_terrain {
                log::debug!("Ignoring completion for unknown load {:?}", completion.id);
                continue;
            }
            self.terrain_load = None;
            match completion.result {
                Ok(LoadedAsset::Terrain(terrain)) => self.set_terrain(terrain),
                Ok(other) => log::warn!("Terrain load produced {:?}", other),
                Err(err) => log::warn!("Terrain failed to load: {}", err),
            }
        }
    }

    /// Sway and ambient animation at absolute time `elapsed_ms`.
    pub fn animate(&mut self, elapsed_ms: f64) {
        for flower in self.flowers.values_mut() {
            flower.update(elapsed_ms);
            sync_flower(self.graph.as_mut(), flower);
        }
        if let Some(ambient) = &mut self.ambient {
            for (node, visual) in ambient.animate(elapsed_ms) {
                self.graph.update_node(node, visual);
            }
        }
    }

    pub fn draw(&mut self, camera: &Camera) {
        self.graph.draw(camera);
    }

    /// Cancels outstanding loads and releases every node.
    pub fn teardown(&mut self) {
        if let Some((_, token)) = self.terrain_load.take() {
            token.cancel();
        }
        for (_, mut flower) in self.flowers.drain() {
            flower.cancel_load();
            self.graph.remove_node(flower.node());
        }
        self.pending_flowers.clear();
        for node in self.terrain_nodes.drain(..) {
            self.graph.remove_node(node);
        }
        self.terrain = None;
        if let Some(ambient) = self.ambient.take() {
            for (node, _) in ambient.nodes() {
                self.graph.remove_node(node);
            }
        }
        self.hover.hide();
        self.graph.remove_node(self.hover.node());
        log::info!("Scene torn down");
    }
}

fn sync_flower(graph: &mut dyn SceneGraph, flower: &Flower) {
    if let Some(visual) = flower.visual() {
        graph.update_node(flower.node(), visual);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::assets::{encode_test_png, LoadMode};
    use crate::geometry::{MeshGroup, MeshPart, TriMesh};
    use crate::render::HeadlessRenderer;
    use glam::Mat4;
    use rand::SeedableRng;

    /// Flat ground at y = 0 spanning ±10 on X and Z.
    pub fn flat_terrain() -> Terrain {
        let grid = TriMesh::grid(Vec2::splat(-10.0), Vec2::splat(10.0), 4, |_, _| 0.0);
        Terrain::new(MeshGroup::new(vec![MeshPart::new(grid, Mat4::IDENTITY)], Mat4::IDENTITY))
    }

    /// Headless scene with inline loading and no terrain.
    pub fn bare_scene() -> Scene {
        Scene::new(
            Box::new(HeadlessRenderer::new()),
            AssetLoader::new(LoadMode::Inline, "missing-flower.png"),
            ImageSource::Encoded(encode_test_png(4, 8)),
            StdRng::seed_from_u64(42),
        )
    }

    pub fn flat_scene() -> Scene {
        let mut scene = bare_scene();
        scene.set_terrain(flat_terrain());
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::geometry::ground_ray;

    #[test]
    fn flower_gets_a_node_once_loaded() {
        let mut scene = flat_scene();
        let before = scene.graph().node_count();
        let key = scene.spawn_flower(Vec3::new(1.0, 0.0, 1.0));
        assert!(!scene.flower(key).unwrap().is_loaded());
        assert_eq!(scene.graph().node_count(), before);

        scene.poll_assets();
        let flower = scene.flower(key).unwrap();
        assert!(flower.is_loaded());
        assert!(scene.graph().contains(flower.node()));
        // 4x8 image: quad is twice as tall as it is wide.
        let bounds = flower.visual().unwrap().mesh.as_ref().unwrap().bounds().unwrap();
        assert!((bounds.max.y - 0.8).abs() < 1e-5);
    }

    #[test]
    fn removing_pending_flower_cancels_its_load() {
        let mut scene = flat_scene();
        let key = scene.spawn_flower(Vec3::ZERO);
        assert!(scene.remove_flower(key));
        assert!(!scene.remove_flower(key));
        scene.poll_assets();
        assert_eq!(scene.flower_count(), 0);
        assert!(scene.pending_flowers.is_empty());
    }

    #[test]
    fn flowers_within_ignores_height_and_is_strict() {
        let mut scene = flat_scene();
        let near = scene.spawn_flower(Vec3::new(0.05, 3.0, 0.0));
        let _edge = scene.spawn_flower(Vec3::new(0.0, 0.0, 0.25));
        let far = scene.spawn_flower(Vec3::new(1.0, 0.0, 0.0));
        assert!(scene.flowers_within(Vec3::ZERO, 2.0).is_empty());

        scene.poll_assets();
        assert_eq!(scene.flowers_within(Vec3::ZERO, 0.1), vec![near]);
        assert_eq!(scene.flowers_within(Vec3::ZERO, 0.25), vec![near]);
        assert!(!scene.flowers_within(Vec3::ZERO, 2.0).is_empty());
        assert!(scene.flowers_within(Vec3::ZERO, 2.0).contains(&far));
    }

    #[test]
    fn absent_terrain_reports_no_hit() {
        let scene = bare_scene();
        assert!(scene.raycast_terrain(&ground_ray(Vec3::ZERO, 10.0, 100.0)).is_none());
    }

    #[test]
    fn terrain_load_replaces_nodes() {
        let mut scene = bare_scene();
        scene.load_terrain(
            TerrainSource::Procedural {
                size: 6.0,
                resolution: 6,
                amplitude: 0.3,
            },
            TerrainLayout::default(),
        );
        assert!(scene.terrain().is_none());
        scene.poll_assets();
        assert!(scene.terrain().is_some());
        assert_eq!(scene.terrain_nodes.len(), 4);
        assert!(scene.raycast_terrain(&ground_ray(Vec3::ZERO, 10.0, 100.0)).is_some());
    }

    #[test]
    fn teardown_releases_everything() {
        let mut scene = flat_scene();
        scene.spawn_ambient();
        scene.spawn_flower(Vec3::ZERO);
        scene.poll_assets();
        scene.spawn_flower(Vec3::X);
        scene.teardown();
        assert_eq!(scene.graph().node_count(), 0);
        assert_eq!(scene.flower_count(), 0);
        assert!(scene.terrain().is_none());
        scene.poll_assets();
        assert_eq!(scene.graph().node_count(), 0);
    }

    #[test]
    fn scale_input_is_clamped_not_rejected() {
        let mut scene = flat_scene();
        let key = scene.plant_flower(ImageSource::Default, Vec3::ZERO, 0.0);
        scene.poll_assets();
        assert_eq!(scene.set_flower_scale(key, f32::INFINITY), Some(5.0));
        assert_eq!(scene.set_flower_scale(key, -3.0), Some(0.1));
        assert_eq!(scene.set_flower_scale(key, f32::NAN), Some(0.1));
        let flower = scene.flower(key).unwrap();
        assert_eq!(flower.visual().unwrap().transform, flower.transform());
    }

    #[test]
    fn animate_sways_loaded_flowers() {
        let mut scene = flat_scene();
        let key = scene.plant_flower(ImageSource::Default, Vec3::new(0.3, 0.0, 0.0), 0.0);
        scene.poll_assets();
        scene.animate(1234.0);
        let flower = scene.flower(key).unwrap();
        let expected = (1234.0f64 * 0.002 + 0.6).sin() as f32 * 0.1;
        assert!((flower.tilt() - expected).abs() < 1e-5);
    }
}
