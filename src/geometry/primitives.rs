//! Parametric primitives: sphere, dome, cylinder, cone, quad and sheet.
//!
//! All shapes are centred on the origin horizontally. Cylinders and cones
//! stand on y = 0 so stems and trunks grow upward from their root.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use super::MeshData;

fn clamp_segments(segments: u32) -> u32 {
    if !(3..=256).contains(&segments) {
        log::warn!("segments {} out of range, clamping to 3..=256", segments);
    }
    segments.clamp(3, 256)
}

fn clamp_rings(rings: u32) -> u32 {
    if !(2..=256).contains(&rings) {
        log::warn!("rings {} out of range, clamping to 2..=256", rings);
    }
    rings.clamp(2, 256)
}

/// UV sphere centred on the origin
pub fn generate_sphere(radius: f32, segments: u32, rings: u32) -> MeshData {
    sphere_band(radius, segments, rings, rings)
}

/// Upper hemisphere with its rim on y = 0 (mushroom caps, canopies)
pub fn generate_dome(radius: f32, segments: u32, rings: u32) -> MeshData {
    let rings = clamp_rings(rings);
    // twice the rings over the full sphere, keep the top half
    sphere_band(radius, segments, rings * 2, rings)
}

fn sphere_band(radius: f32, segments: u32, total_rings: u32, kept_rings: u32) -> MeshData {
    let segments = clamp_segments(segments);
    let total_rings = clamp_rings(total_rings);
    let kept_rings = kept_rings.min(total_rings);
    let mut mesh = MeshData::new();

    for ring in 0..=kept_rings {
        let phi = ring as f32 / total_rings as f32 * PI;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for seg in 0..=segments {
            let theta = seg as f32 / segments as f32 * TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let normal = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
            mesh.add_vertex(normal * radius, normal);
        }
    }

    for ring in 0..kept_rings {
        for seg in 0..segments {
            let i0 = ring * (segments + 1) + seg;
            let i1 = i0 + 1;
            let i2 = i0 + segments + 1;
            let i3 = i2 + 1;
            mesh.add_triangle(i0, i1, i3);
            mesh.add_triangle(i0, i3, i2);
        }
    }

    mesh
}

/// Open-ended tapered cylinder from y = 0 to `height`.
///
/// A zero `radius_top` gives a cone.
pub fn generate_cylinder(radius_bottom: f32, radius_top: f32, height: f32, segments: u32) -> MeshData {
    let segments = clamp_segments(segments);
    let mut mesh = MeshData::new();

    // side normals lean with the taper
    let slope = (radius_bottom - radius_top) / height.max(1e-4);

    for seg in 0..=segments {
        let theta = seg as f32 / segments as f32 * TAU;
        let (sin_theta, cos_theta) = theta.sin_cos();
        let normal = Vec3::new(cos_theta, slope, sin_theta).normalize();
        mesh.add_vertex(Vec3::new(cos_theta * radius_bottom, 0.0, sin_theta * radius_bottom), normal);
        mesh.add_vertex(Vec3::new(cos_theta * radius_top, height, sin_theta * radius_top), normal);
    }

    for seg in 0..segments {
        let b0 = seg * 2;
        let t0 = b0 + 1;
        let b1 = b0 + 2;
        let t1 = b0 + 3;
        mesh.add_triangle(b0, t0, t1);
        mesh.add_triangle(b0, t1, b1);
    }

    mesh
}

/// Cone with its base on y = 0
pub fn generate_cone(radius: f32, height: f32, segments: u32) -> MeshData {
    generate_cylinder(radius, 0.0, height, segments)
}

/// Upright double-sided quad in the XY plane, bottom edge on y = 0
pub fn generate_quad(width: f32, height: f32) -> MeshData {
    generate_sheet(width, height, 1, 1)
}

/// Double-sided quad subdivided into `columns` x `rows` cells, for surfaces
/// that bend (waterfall sheets). Same placement as [`generate_quad`].
pub fn generate_sheet(width: f32, height: f32, columns: u32, rows: u32) -> MeshData {
    if !(1..=256).contains(&columns) || !(1..=256).contains(&rows) {
        log::warn!("sheet {}x{} out of range, clamping to 1..=256", columns, rows);
    }
    let (columns, rows) = (columns.clamp(1, 256), rows.clamp(1, 256));
    let hw = width * 0.5;
    let stride = columns + 1;
    let mut mesh = MeshData::new();

    for normal in [Vec3::Z, Vec3::NEG_Z] {
        let base = mesh.vertex_count() as u32;
        for j in 0..=rows {
            for i in 0..=columns {
                let x = -hw + width * i as f32 / columns as f32;
                let y = height * j as f32 / rows as f32;
                mesh.add_vertex(Vec3::new(x, y, 0.0), normal);
            }
        }
        for j in 0..rows {
            for i in 0..columns {
                let a = base + j * stride + i;
                let (b, c, d) = (a + 1, a + stride + 1, a + stride);
                if normal.z > 0.0 {
                    mesh.add_triangle(a, b, c);
                    mesh.add_triangle(a, c, d);
                } else {
                    mesh.add_triangle(a, c, b);
                    mesh.add_triangle(a, d, c);
                }
            }
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_valid(mesh: &MeshData) -> bool {
        mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count())
    }

    #[test]
    fn test_sphere_counts() {
        let mesh = generate_sphere(1.0, 8, 4);
        assert_eq!(mesh.vertex_count(), 9 * 5);
        assert_eq!(mesh.triangle_count(), 8 * 4 * 2);
        assert!(indices_valid(&mesh));
    }

    #[test]
    fn test_sphere_on_radius() {
        let mesh = generate_sphere(2.5, 12, 8);
        for v in &mesh.vertices {
            assert!((Vec3::from(v.position).length() - 2.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_segments_clamped() {
        let mesh = generate_sphere(1.0, 1, 1);
        // 3 segments, 2 rings
        assert_eq!(mesh.vertex_count(), 4 * 3);
    }

    #[test]
    fn test_dome_is_upper_half() {
        let mesh = generate_dome(1.0, 10, 4);
        let (lo, hi) = mesh.bounds();
        assert!(lo.y > -1e-4);
        assert!((hi.y - 1.0).abs() < 1e-4);
        assert!(indices_valid(&mesh));
    }

    #[test]
    fn test_cone_tip() {
        let mesh = generate_cone(0.5, 2.0, 6);
        let (lo, hi) = mesh.bounds();
        assert_eq!(lo.y, 0.0);
        assert_eq!(hi.y, 2.0);
        for v in mesh.vertices.iter().filter(|v| v.position[1] == 2.0) {
            assert!(v.position[0].abs() < 1e-6 && v.position[2].abs() < 1e-6);
        }
        assert!(indices_valid(&mesh));
    }

    #[test]
    fn test_quad_double_sided() {
        let mesh = generate_quad(2.0, 1.0);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 4);
        let (lo, hi) = mesh.bounds();
        assert_eq!(lo, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(hi, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_sheet_subdivides_both_faces() {
        let mesh = generate_sheet(2.0, 6.0, 2, 12);
        assert_eq!(mesh.vertex_count(), 2 * 3 * 13);
        assert_eq!(mesh.triangle_count(), 2 * 2 * 12 * 2);
        assert!(indices_valid(&mesh));
        let (lo, hi) = mesh.bounds();
        assert_eq!(lo, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(hi, Vec3::new(1.0, 6.0, 0.0));
    }
}
