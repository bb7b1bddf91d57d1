use super::types::{Aabb, Material, Transform};
use crate::collision::broadphase::{Broadphase, BroadphaseHandle};
use crate::utils::allocator::EntityId;
use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Enumeration of supported collider geometries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

/// Discriminant of [`ColliderShape`], used to dispatch narrow-phase tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Sphere,
    Box,
}

impl ColliderShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ColliderShape::Sphere { .. } => ShapeKind::Sphere,
            ColliderShape::Box { .. } => ShapeKind::Box,
        }
    }

    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => *radius,
            ColliderShape::Box { half_extents } => half_extents.length(),
        }
    }

    /// Support point in shape-local space.
    pub fn local_support(&self, direction: Vec3) -> Vec3 {
        match self {
            ColliderShape::Sphere { radius } => direction.normalize_or_zero() * *radius,
            ColliderShape::Box { half_extents } => Vec3::new(
                if direction.x >= 0.0 { half_extents.x } else { -half_extents.x },
                if direction.y >= 0.0 { half_extents.y } else { -half_extents.y },
                if direction.z >= 0.0 { half_extents.z } else { -half_extents.z },
            ),
        }
    }

    fn aabb(&self, transform: &Transform) -> Aabb {
        match self {
            ColliderShape::Sphere { radius } => {
                Aabb::from_center_half_extents(transform.position, Vec3::splat(*radius))
            }
            ColliderShape::Box { half_extents } => {
                let rotation = Mat3::from_quat(transform.rotation);
                let extent = Vec3::new(
                    rotation.row(0).abs().dot(*half_extents),
                    rotation.row(1).abs().dot(*half_extents),
                    rotation.row(2).abs().dot(*half_extents),
                );
                Aabb::from_center_half_extents(transform.position, extent)
            }
        }
    }
}

/// Single-bit collider flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColliderFlags(u32);

impl ColliderFlags {
    pub const STATIC: ColliderFlags = ColliderFlags(1 << 0);
    /// Reports overlaps but produces no contact response.
    pub const TRIGGER: ColliderFlags = ColliderFlags(1 << 1);
    /// Excluded from pair generation.
    pub const DISABLED: ColliderFlags = ColliderFlags(1 << 2);

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Collider attached to a rigid body.
///
/// The `owner` id is a non-owning back reference resolved through the
/// world's body arena. `broadphase_handle()` is `Some` exactly while the
/// collider is inserted in a broadphase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collider {
    owner: EntityId,
    shape: ColliderShape,
    material: Material,
    flags: ColliderFlags,
    pub offset: Transform,
    world_transform: Transform,
    aabb: Aabb,
    #[serde(skip)]
    broadphase_handle: Option<BroadphaseHandle>,
}

impl Default for Collider {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Collider {
    pub fn sphere(radius: f32) -> Self {
        Self::builder().sphere(radius).build()
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::builder().box_shape(half_extents).build()
    }

    pub fn builder() -> ColliderBuilder {
        ColliderBuilder::new()
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: EntityId) {
        self.owner = owner;
    }

    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    pub fn shape_kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Replaces the geometry and recomputes the AABB at the current transform.
    /// The broadphase sees the new volume on the next `sync_broadphase`.
    pub fn set_shape(&mut self, shape: ColliderShape) {
        self.shape = shape;
        self.aabb = shape.aabb(&self.world_transform);
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    pub fn set_flag(&mut self, flag: ColliderFlags, value: bool) {
        if value {
            self.flags.0 |= flag.0;
        } else {
            self.flags.0 &= !flag.0;
        }
    }

    pub fn get_flag(&self, flag: ColliderFlags) -> bool {
        self.flags.0 & flag.0 != 0
    }

    pub fn flags(&self) -> ColliderFlags {
        self.flags
    }

    pub fn world_transform(&self) -> &Transform {
        &self.world_transform
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn broadphase_handle(&self) -> Option<BroadphaseHandle> {
        self.broadphase_handle
    }

    /// Refreshes the world transform from the parent and recomputes the AABB.
    pub fn update_model_inst(&mut self, parent: &Transform) {
        self.world_transform = parent.combine(&self.offset);
        self.aabb = self.shape.aabb(&self.world_transform);
    }

    /// World-space support point in `direction`.
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let local_dir = self.world_transform.rotation.conjugate() * direction;
        self.world_transform
            .transform_point(self.shape.local_support(local_dir))
    }

    /// Inserts the current AABB with the owner id as userdata. Calling it on
    /// an already inserted collider only refreshes the volume.
    pub fn initialize(&mut self, broadphase: &mut dyn Broadphase) {
        if self.broadphase_handle.is_some() {
            self.sync_broadphase(broadphase);
            return;
        }
        self.broadphase_handle = Some(broadphase.insert(self.aabb, self.owner));
    }

    pub fn uninitialize(&mut self, broadphase: &mut dyn Broadphase) {
        if let Some(handle) = self.broadphase_handle.take() {
            broadphase.remove(handle);
        }
    }

    /// Pushes the current AABB into the broadphase.
    pub fn sync_broadphase(&mut self, broadphase: &mut dyn Broadphase) {
        if let Some(handle) = self.broadphase_handle {
            self.broadphase_handle = Some(broadphase.update(self.aabb, handle));
        }
    }
}

pub struct ColliderBuilder {
    shape: ColliderShape,
    offset: Transform,
    material: Material,
    flags: ColliderFlags,
}

impl Default for ColliderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ColliderBuilder {
    pub fn new() -> Self {
        Self {
            shape: ColliderShape::Sphere { radius: 1.0 },
            offset: Transform::default(),
            material: Material::default(),
            flags: ColliderFlags::default(),
        }
    }

    pub fn sphere(mut self, radius: f32) -> Self {
        self.shape = ColliderShape::Sphere { radius };
        self
    }

    pub fn box_shape(mut self, half_extents: Vec3) -> Self {
        self.shape = ColliderShape::Box { half_extents };
        self
    }

    pub fn offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn is_trigger(mut self, is_trigger: bool) -> Self {
        if is_trigger {
            self.flags.0 |= ColliderFlags::TRIGGER.0;
        }
        self
    }

    pub fn build(self) -> Collider {
        let world_transform = self.offset;
        Collider {
            owner: EntityId::NULL,
            shape: self.shape,
            material: self.material,
            flags: self.flags,
            offset: self.offset,
            world_transform,
            aabb: self.shape.aabb(&world_transform),
            broadphase_handle: None,
        }
    }
}
