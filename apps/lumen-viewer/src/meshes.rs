//! Procedural mesh data for the demo scene.

use glam::Vec3;
use lumen_render::{MeshData, Vertex};

/// Unit cube centered at the origin, one flat color per face.
pub fn cube() -> MeshData {
    struct Face {
        normal: Vec3,
        color: Vec3,
        corners: [Vec3; 4],
    }

    let h = 0.5;
    let faces = [
        // Left (white)
        Face {
            normal: Vec3::new(-1.0, 0.0, 0.0),
            color: Vec3::new(0.9, 0.9, 0.9),
            corners: [
                Vec3::new(-h, -h, -h),
                Vec3::new(-h, -h, h),
                Vec3::new(-h, h, h),
                Vec3::new(-h, h, -h),
            ],
        },
        // Right (yellow)
        Face {
            normal: Vec3::new(1.0, 0.0, 0.0),
            color: Vec3::new(0.8, 0.8, 0.1),
            corners: [
                Vec3::new(h, -h, h),
                Vec3::new(h, -h, -h),
                Vec3::new(h, h, -h),
                Vec3::new(h, h, h),
            ],
        },
        // Top (orange); Y points down, so the top face is at -h
        Face {
            normal: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::new(0.9, 0.6, 0.1),
            corners: [
                Vec3::new(-h, -h, -h),
                Vec3::new(h, -h, -h),
                Vec3::new(h, -h, h),
                Vec3::new(-h, -h, h),
            ],
        },
        // Bottom (red)
        Face {
            normal: Vec3::new(0.0, 1.0, 0.0),
            color: Vec3::new(0.8, 0.1, 0.1),
            corners: [
                Vec3::new(-h, h, h),
                Vec3::new(h, h, h),
                Vec3::new(h, h, -h),
                Vec3::new(-h, h, -h),
            ],
        },
        // Front (blue)
        Face {
            normal: Vec3::new(0.0, 0.0, -1.0),
            color: Vec3::new(0.1, 0.1, 0.8),
            corners: [
                Vec3::new(h, -h, -h),
                Vec3::new(-h, -h, -h),
                Vec3::new(-h, h, -h),
                Vec3::new(h, h, -h),
            ],
        },
        // Back (green)
        Face {
            normal: Vec3::new(0.0, 0.0, 1.0),
            color: Vec3::new(0.1, 0.8, 0.1),
            corners: [
                Vec3::new(-h, -h, h),
                Vec3::new(h, -h, h),
                Vec3::new(h, h, h),
                Vec3::new(-h, h, h),
            ],
        },
    ];

    let mut data = MeshData::default();
    for face in faces {
        let base = data.vertices.len() as u32;
        for corner in face.corners {
            data.vertices.push(Vertex {
                position: corner,
                color: face.color,
                normal: face.normal,
            });
        }
        data.indices
            .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    data
}

/// Flat quad in the XZ plane spanning [-1, 1], facing up (negative Y).
pub fn floor_quad() -> MeshData {
    let normal = Vec3::new(0.0, -1.0, 0.0);
    let color = Vec3::new(0.6, 0.6, 0.6);
    let vertices = vec![
        Vertex {
            position: Vec3::new(-1.0, 0.0, -1.0),
            color,
            normal,
        },
        Vertex {
            position: Vec3::new(1.0, 0.0, -1.0),
            color,
            normal,
        },
        Vertex {
            position: Vec3::new(1.0, 0.0, 1.0),
            color,
            normal,
        },
        Vertex {
            position: Vec3::new(-1.0, 0.0, 1.0),
            color,
            normal,
        },
    ];
    MeshData {
        vertices,
        indices: vec![0, 2, 1, 0, 3, 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_one_quad_per_face() {
        let data = cube();
        assert_eq!(data.vertices.len(), 24);
        assert_eq!(data.indices.len(), 36);
        assert!(data.indices.iter().all(|&i| (i as usize) < 24));
    }

    #[test]
    fn floor_normals_point_up() {
        let data = floor_quad();
        assert!(data.vertices.iter().all(|v| v.normal.y < 0.0));
    }
}
