//! Print job model consumed by the seam placer.
//!
//! This module provides the inputs of seam placement:
//! - [`Print`] - an entire print job
//! - [`PrintObject`] - one object with its volumes, instance transform and sliced layers
//! - [`ModelVolume`] - a mesh part with its role and painted seam facets
//! - [`Layer`] - one slice with its external perimeter polygons

use crate::config::SeamPosition;
use crate::geometry::{Polygons, Transform3D};
use crate::mesh::TriangleMesh;
use crate::CoordF;

/// Represents an entire print job containing one or more objects.
#[derive(Debug, Default)]
pub struct Print {
    objects: Vec<PrintObject>,
}

impl Print {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Add an object; its index is the object id used by the seam placer.
    pub fn add_object(&mut self, object: PrintObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn objects(&self) -> &[PrintObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [PrintObject] {
        &mut self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Role of a model volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VolumeType {
    /// Printed geometry.
    #[default]
    ModelPart,
    /// Geometry subtracted from the model parts.
    NegativeVolume,
    /// Region that only changes settings.
    ParameterModifier,
    SupportBlocker,
    SupportEnforcer,
}

/// Triangles painted as seam enforcers or blockers, as indices into the
/// volume's mesh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeamFacets {
    pub enforcers: Vec<usize>,
    pub blockers: Vec<usize>,
}

impl SeamFacets {
    pub fn is_empty(&self) -> bool {
        self.enforcers.is_empty() && self.blockers.is_empty()
    }

    /// Sub-mesh made of the listed triangles of `mesh`. Out of range indices
    /// are ignored.
    pub fn extract(mesh: &TriangleMesh, facets: &[usize]) -> TriangleMesh {
        let mut result = TriangleMesh::new();
        for &facet in facets {
            if facet >= mesh.triangle_count() {
                continue;
            }
            let [a, b, c] = mesh.triangle_vertices(facet);
            let ia = result.add_vertex(a);
            let ib = result.add_vertex(b);
            let ic = result.add_vertex(c);
            result.add_triangle_indices(ia, ib, ic);
        }
        result
    }

    pub fn enforcer_mesh(&self, mesh: &TriangleMesh) -> TriangleMesh {
        Self::extract(mesh, &self.enforcers)
    }

    pub fn blocker_mesh(&self, mesh: &TriangleMesh) -> TriangleMesh {
        Self::extract(mesh, &self.blockers)
    }
}

/// A mesh part of a print object.
#[derive(Clone, Debug, Default)]
pub struct ModelVolume {
    /// Mesh in volume coordinates.
    pub mesh: TriangleMesh,
    /// Volume to object transform.
    pub trafo: Transform3D,
    pub volume_type: VolumeType,
    pub seam_facets: SeamFacets,
}

impl ModelVolume {
    /// A model part with identity transform and nothing painted.
    pub fn new(mesh: TriangleMesh) -> Self {
        Self {
            mesh,
            ..Default::default()
        }
    }

    pub fn with_trafo(mut self, trafo: Transform3D) -> Self {
        self.trafo = trafo;
        self
    }

    pub fn with_type(mut self, volume_type: VolumeType) -> Self {
        self.volume_type = volume_type;
        self
    }

    pub fn with_seam_facets(mut self, seam_facets: SeamFacets) -> Self {
        self.seam_facets = seam_facets;
        self
    }

    pub fn is_model_part(&self) -> bool {
        self.volume_type == VolumeType::ModelPart
    }
}

/// One sliced layer of an object.
#[derive(Clone, Debug)]
pub struct Layer {
    /// Height of the slicing plane in mm.
    pub slice_z: CoordF,
    /// External perimeter polygons in scaled coordinates.
    pub perimeters: Polygons,
}

impl Layer {
    pub fn new(slice_z: CoordF, perimeters: Polygons) -> Self {
        Self { slice_z, perimeters }
    }
}

/// Represents a single object to be printed.
#[derive(Clone, Debug, Default)]
pub struct PrintObject {
    name: String,
    volumes: Vec<ModelVolume>,
    /// Object to world transform.
    instance_trafo: Transform3D,
    layers: Vec<Layer>,
    seam_position: SeamPosition,
}

impl PrintObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Object made of a single model part.
    pub fn from_mesh(name: impl Into<String>, mesh: TriangleMesh) -> Self {
        let mut object = Self::new(name);
        object.add_volume(ModelVolume::new(mesh));
        object
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_volume(&mut self, volume: ModelVolume) {
        self.volumes.push(volume);
    }

    pub fn volumes(&self) -> &[ModelVolume] {
        &self.volumes
    }

    pub fn instance_trafo(&self) -> &Transform3D {
        &self.instance_trafo
    }

    pub fn set_instance_trafo(&mut self, trafo: Transform3D) {
        self.instance_trafo = trafo;
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn set_layers(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
    }

    pub fn seam_position(&self) -> SeamPosition {
        self.seam_position
    }

    pub fn set_seam_position(&mut self, seam_position: SeamPosition) {
        self.seam_position = seam_position;
    }

    pub fn is_sliced(&self) -> bool {
        !self.layers.is_empty()
    }

    /// All model parts merged in object coordinates.
    pub fn model_parts_mesh(&self) -> TriangleMesh {
        let mut merged = TriangleMesh::new();
        for volume in self.volumes.iter().filter(|v| v.is_model_part()) {
            merged.merge(&volume.mesh.transformed(&volume.trafo));
        }
        merged
    }

    /// Painted enforcer and blocker triangles of every volume in world
    /// coordinates.
    pub fn painted_seam_meshes(&self) -> (TriangleMesh, TriangleMesh) {
        let mut enforcers = TriangleMesh::new();
        let mut blockers = TriangleMesh::new();
        for volume in &self.volumes {
            if volume.seam_facets.is_empty() {
                continue;
            }
            let trafo = volume.trafo.then(&self.instance_trafo);
            enforcers.merge(&volume.seam_facets.enforcer_mesh(&volume.mesh).transformed(&trafo));
            blockers.merge(&volume.seam_facets.blocker_mesh(&volume.mesh).transformed(&trafo));
        }
        (enforcers, blockers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    #[test]
    fn test_print_new() {
        let mut print = Print::new();
        assert!(print.is_empty());
        let id = print.add_object(PrintObject::new("a"));
        assert_eq!(id, 0);
        assert_eq!(print.object_count(), 1);
    }

    #[test]
    fn test_print_object_defaults() {
        let obj = PrintObject::from_mesh("cube", TriangleMesh::cube(10.0));
        assert_eq!(obj.name(), "cube");
        assert!(!obj.is_sliced());
        assert_eq!(obj.seam_position(), SeamPosition::Aligned);
        assert!(obj.instance_trafo().is_identity(1e-12));
    }

    #[test]
    fn test_model_parts_mesh_skips_other_volumes() {
        let mut obj = PrintObject::new("parts");
        obj.add_volume(ModelVolume::new(TriangleMesh::cube(10.0)));
        obj.add_volume(
            ModelVolume::new(TriangleMesh::cube(2.0)).with_type(VolumeType::NegativeVolume),
        );
        obj.add_volume(
            ModelVolume::new(TriangleMesh::cube(2.0))
                .with_type(VolumeType::ModelPart)
                .with_trafo(Transform3D::translation(20.0, 0.0, 0.0)),
        );

        let merged = obj.model_parts_mesh();
        assert_eq!(merged.triangle_count(), 24);
        let max_x = merged.vertices().iter().map(|v| v.x).fold(f64::MIN, f64::max);
        assert!((max_x - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_seam_facets_extract() {
        let cube = TriangleMesh::cube(2.0);
        let facets = SeamFacets {
            enforcers: vec![0, 1, 99],
            blockers: vec![],
        };
        let enforcers = facets.enforcer_mesh(&cube);
        assert_eq!(enforcers.triangle_count(), 2);
        assert!(facets.blocker_mesh(&cube).is_empty());
        assert_eq!(enforcers.triangle_vertices(0), cube.triangle_vertices(0));
    }

    #[test]
    fn test_painted_meshes_use_instance_trafo() {
        let mut obj = PrintObject::new("painted");
        obj.add_volume(ModelVolume::new(TriangleMesh::cube(2.0)).with_seam_facets(SeamFacets {
            enforcers: vec![],
            blockers: vec![0],
        }));
        obj.set_instance_trafo(Transform3D::translation(0.0, 0.0, 5.0));

        let (enforcers, blockers) = obj.painted_seam_meshes();
        assert!(enforcers.is_empty());
        assert_eq!(blockers.triangle_count(), 1);
        let original = TriangleMesh::cube(2.0).triangle_vertices(0)[0];
        assert_eq!(blockers.vertices()[0], original + Vec3::new(0.0, 0.0, 5.0));
    }
}
