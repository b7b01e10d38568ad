//! Scene graph and hierarchical scene organization.
//!
//! Every node holds a list of instances as `(local, world)` transform pairs.
//! Instance `i` of a child is placed relative to instance `i` of its parent,
//! so a container with one instance acts as a plain group, and a model node
//! with many instances draws them all with one instanced call.

use std::ops::Range;

use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::{Instance, InstanceRaw},
        model::{self, Material},
    },
    render::Instanced,
};

pub trait SceneNode {
    fn get_world_transforms(&self) -> Vec<Instance>;

    fn get_local_transform(&self, idx: usize) -> Option<Instance>;

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    fn set_local_transform(&mut self, idx: usize, instance: Instance);

    /// Uploads world transforms and materials, recreating buffers whose size changed.
    fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device);

    /**
     * Multiple instances of a parent can be passed down to multiple instances of multiple children.
     * The argument `parents_world_transform` with a matching `range` size provides control over which instances are transformed.
     */
    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]);

    fn update_world_transform_all(&mut self);

    fn instance_count(&self) -> usize;

    fn add_instance(&mut self, instance: Instance) -> usize;

    fn add_instances(&mut self, instances: Vec<Instance>) -> usize;

    fn remove_instance(&mut self, idx: usize) -> (Instance, Instance);

    fn get_render(&self) -> Vec<Instanced<'_>>;
}

/// Applies `parents` to `instances[range]` and returns the range that was
/// updated with the resulting world transforms, or `None` (with a warning)
/// when the sizes don't fit.
///
/// A single parent instance acts as a group: it applies to every instance.
fn apply_parents(
    instances: &mut [(Instance, Instance)],
    range: Range<usize>,
    parents: &[Instance],
) -> Option<(Range<usize>, Vec<Instance>)> {
    let len = instances.len();
    if let [parent] = parents
        && range == (0..1)
        && len > 1
    {
        let world_transforms = instances
            .iter_mut()
            .map(|(local, world)| {
                *world = parent * &*local;
                *world
            })
            .collect();
        return Some((0..len, world_transforms));
    }
    if parents.len() > len {
        warn!(
            "You tried to transform with len {}, but there are only {} instances to transform.",
            parents.len(),
            len
        );
        return None;
    }
    let Some(slice) = instances.get_mut(range.clone()) else {
        warn!(
            "You tried to transform range {}..{}, which is out of bounds for parent len {}.",
            range.start, range.end, len,
        );
        return None;
    };
    Some((
        range,
        slice
            .iter_mut()
            .zip(parents)
            .map(|((local, world), parent)| {
                *world = parent * &*local;
                *world
            })
            .collect(),
    ))
}

fn identity_parents(amount: usize) -> Vec<Instance> {
    (0..amount).map(|_| Instance::default()).collect()
}

pub struct ContainerNode {
    pub children: Vec<Box<dyn SceneNode>>,
    pub instances: Vec<(Instance, Instance)>,
}

impl ContainerNode {
    pub fn new(amount: usize) -> Self {
        let instances = (0..amount)
            .map(|_| (Instance::default(), Instance::default()))
            .collect();
        Self {
            instances,
            children: vec![],
        }
    }
}

impl SceneNode for ContainerNode {
    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn set_local_transform(&mut self, idx: usize, instance: Instance) {
        if let Some((local, _)) = self.instances.get_mut(idx) {
            *local = instance;
        }
    }

    fn get_world_transforms(&self) -> Vec<Instance> {
        self.instances.iter().map(|(_, world)| *world).collect()
    }

    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]) {
        let Some((range, world_transforms)) = apply_parents(&mut self.instances, range, parents_world_transform)
        else {
            return;
        };
        for child in self.children.iter_mut() {
            child.update_world_transforms(range.clone(), &world_transforms);
        }
    }

    fn get_local_transform(&self, idx: usize) -> Option<Instance> {
        self.instances.get(idx).map(|(local, _)| *local)
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue, device));
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn update_world_transform_all(&mut self) {
        let range = 0..self.instances.len();
        self.update_world_transforms(range, &identity_parents(self.instances.len()));
    }

    fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn add_instance(&mut self, instance: Instance) -> usize {
        self.instances.push((instance, instance));
        for child in &mut self.children {
            child.add_instance(Instance::default());
        }
        self.instances.len()
    }

    fn add_instances(&mut self, instances: Vec<Instance>) -> usize {
        let len = instances.len();
        self.instances.extend(instances.into_iter().map(|i| (i, i)));
        for child in &mut self.children {
            child.add_instances(identity_parents(len));
        }
        self.instances.len()
    }

    fn remove_instance(&mut self, idx: usize) -> (Instance, Instance) {
        self.children.iter_mut().for_each(|c| {
            c.remove_instance(idx);
        });
        self.instances.remove(idx)
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

pub struct ModelNode {
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: wgpu::Buffer,
    instances: Vec<(Instance, Instance)>,
    buffer_size_needs_change: bool,
    materials_dirty: bool,
    model: model::Model,
    cast_shadow: bool,
    transparent: bool,
}

impl ModelNode {
    pub fn from_model(amount: usize, device: &wgpu::Device, model: model::Model) -> Self {
        let instances = (0..amount)
            .map(|_| (Instance::default(), Instance::default()))
            .collect::<Vec<_>>();

        let instance_data = instances
            .iter()
            .map(|(_, world)| world.to_raw())
            .collect::<Vec<_>>();

        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&instance_data),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            children: vec![],
            instance_buffer,
            instances,
            model,
            buffer_size_needs_change: false,
            materials_dirty: false,
            cast_shadow: false,
            transparent: false,
        }
    }

    pub fn casting_shadows(mut self) -> Self {
        self.cast_shadow = true;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    /// Mutable access to a material; the uniform is re-uploaded on the next write.
    pub fn material_mut(&mut self, idx: usize) -> Option<&mut Material> {
        self.materials_dirty = true;
        self.model.material_mut(idx)
    }

    /// Replaces the local transforms of all instances, resizing the instance buffer if needed.
    pub fn set_instances(&mut self, instances: Vec<Instance>) {
        if instances.len() != self.instances.len() {
            self.buffer_size_needs_change = true;
        }
        self.instances = instances.into_iter().map(|i| (i, i)).collect();
    }
}

impl SceneNode for ModelNode {
    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn set_local_transform(&mut self, idx: usize, instance: Instance) {
        if let Some((local, _)) = self.instances.get_mut(idx) {
            *local = instance;
        }
    }

    fn get_world_transforms(&self) -> Vec<Instance> {
        self.instances.iter().map(|(_, world)| *world).collect()
    }

    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]) {
        let Some((range, world_transforms)) = apply_parents(&mut self.instances, range, parents_world_transform)
        else {
            return;
        };
        for child in self.children.iter_mut() {
            child.update_world_transforms(range.clone(), &world_transforms);
        }
    }

    fn get_local_transform(&self, idx: usize) -> Option<Instance> {
        self.instances.get(idx).map(|(local, _)| *local)
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) {
        let raw_instances: Vec<InstanceRaw> = self
            .instances
            .iter()
            .map(|(_, world)| world.to_raw())
            .collect();
        if self.buffer_size_needs_change {
            self.instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Instance Buffer"),
                contents: bytemuck::cast_slice(&raw_instances),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            self.buffer_size_needs_change = false;
        } else if !raw_instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw_instances));
        }
        if self.materials_dirty {
            self.model
                .materials
                .iter()
                .for_each(|material| material.write_to_buffer(queue));
            self.materials_dirty = false;
        }
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue, device));
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn update_world_transform_all(&mut self) {
        let range = 0..self.instances.len();
        self.update_world_transforms(range, &identity_parents(self.instances.len()));
    }

    fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn add_instance(&mut self, instance: Instance) -> usize {
        self.instances.push((instance, instance));
        for child in &mut self.children {
            child.add_instance(Instance::default());
        }
        self.buffer_size_needs_change = true;
        self.instances.len()
    }

    fn add_instances(&mut self, instances: Vec<Instance>) -> usize {
        let len = instances.len();
        self.instances.extend(instances.into_iter().map(|i| (i, i)));
        for child in &mut self.children {
            child.add_instances(identity_parents(len));
        }
        self.buffer_size_needs_change = true;
        self.instances.len()
    }

    fn remove_instance(&mut self, idx: usize) -> (Instance, Instance) {
        self.children.iter_mut().for_each(|c| {
            c.remove_instance(idx);
        });
        self.buffer_size_needs_change = true;
        self.instances.remove(idx)
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .chain([Instanced {
                instance: &self.instance_buffer,
                model: &self.model,
                amount: self.instances.len(),
                cast_shadow: self.cast_shadow,
                transparent: self.transparent,
            }])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    fn group_at(x: f32) -> ContainerNode {
        let mut node = ContainerNode::new(1);
        node.set_local_transform(0, Instance::new().with_position(Vector3::new(x, 0.0, 0.0)));
        node
    }

    #[test]
    fn world_transforms_compose_down_the_tree() {
        let mut root = group_at(1.0);
        let mut child = group_at(2.0);
        child.add_child(Box::new(group_at(3.0)));
        root.add_child(Box::new(child));

        root.update_world_transform_all();

        let child = &root.get_children()[0];
        assert!(close(child.get_world_transforms()[0].position, Vector3::new(3.0, 0.0, 0.0)));
        let grandchild = &child.get_children()[0];
        assert!(close(grandchild.get_world_transforms()[0].position, Vector3::new(6.0, 0.0, 0.0)));
        // locals are untouched
        assert_eq!(grandchild.get_local_transform(0).map(|i| i.position.x), Some(3.0));
    }

    #[test]
    fn parent_scale_applies_to_child_offsets() {
        let mut root = ContainerNode::new(1);
        root.set_local_transform(0, Instance::new().with_uniform_scale(2.0));
        root.add_child(Box::new(group_at(1.5)));
        root.update_world_transform_all();
        let world = root.get_children()[0].get_world_transforms()[0];
        assert!(close(world.position, Vector3::new(3.0, 0.0, 0.0)));
        assert!(close(world.scale, Vector3::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn out_of_range_updates_are_ignored() {
        let mut node = group_at(1.0);
        node.update_world_transforms(0..3, &identity_parents(3));
        assert_eq!(node.get_world_transforms(), vec![Instance::default()]);
    }

    #[test]
    fn single_parent_instance_places_every_child_instance() {
        let mut house = group_at(10.0);
        let mut bushes = ContainerNode::new(0);
        bushes.add_instances(vec![
            Instance::new().with_position(Vector3::new(1.0, 0.0, 0.0)),
            Instance::new().with_position(Vector3::new(2.0, 0.0, 0.0)),
            Instance::new().with_position(Vector3::new(3.0, 0.0, 0.0)),
        ]);
        house.add_child(Box::new(bushes));
        house.update_world_transform_all();
        let xs: Vec<f32> = house.get_children()[0]
            .get_world_transforms()
            .iter()
            .map(|i| i.position.x)
            .collect();
        assert_eq!(xs, vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn instances_propagate_to_children() {
        let mut root = ContainerNode::new(1);
        root.add_child(Box::new(ContainerNode::new(1)));
        assert_eq!(root.add_instances(vec![Instance::default(); 2]), 3);
        assert_eq!(root.get_children()[0].instance_count(), 3);
        root.remove_instance(0);
        assert_eq!(root.instance_count(), 2);
        assert_eq!(root.get_children()[0].instance_count(), 2);
    }
}
