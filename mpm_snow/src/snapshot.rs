//! The `.snowstate` binary snapshot format (SPEC_FULL §4.12): a fixed header
//! followed by a dense per-particle record, all little-endian IEEE-754 doubles.
//! Written and read through `std::io::{Read, Write}` directly; the format is
//! simple and fixed enough that a serialization crate would add a dependency
//! without buying anything over `to_le_bytes`/`from_le_bytes`.

use std::io::{self, Read, Write};

use glam::{DMat3, DVec3};

use crate::error::{Result, SolverError};
use crate::particle::Particle;
use crate::solver::{Solver, SolverParams};

const MAGIC: [u8; 4] = *b"SNOW";
const VERSION: u32 = 1;

/// Serialize the grid shape, spacing, and every particle's full state.
pub fn save_state<W: Write>(solver: &Solver, mut writer: W) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;

    let (nx, ny, nz) = solver.params().grid_dims;
    writer.write_all(&(nx as u32).to_le_bytes())?;
    writer.write_all(&(ny as u32).to_le_bytes())?;
    writer.write_all(&(nz as u32).to_le_bytes())?;
    writer.write_all(&solver.params().h.to_le_bytes())?;

    let particles = solver.particles();
    writer.write_all(&(particles.len() as u64).to_le_bytes())?;
    for particle in particles {
        write_particle(&mut writer, particle)?;
    }
    Ok(())
}

fn write_particle<W: Write>(writer: &mut W, particle: &Particle) -> io::Result<()> {
    write_vec3(writer, particle.position)?;
    write_vec3(writer, particle.velocity())?;
    writer.write_all(&particle.mass.to_le_bytes())?;
    writer.write_all(&particle.volume0.unwrap_or(0.0).to_le_bytes())?;
    write_mat3(writer, particle.deform_elastic)?;
    write_mat3(writer, particle.deform_plastic)?;
    Ok(())
}

fn write_vec3<W: Write>(writer: &mut W, v: DVec3) -> io::Result<()> {
    writer.write_all(&v.x.to_le_bytes())?;
    writer.write_all(&v.y.to_le_bytes())?;
    writer.write_all(&v.z.to_le_bytes())?;
    Ok(())
}

fn write_mat3<W: Write>(writer: &mut W, m: DMat3) -> io::Result<()> {
    write_vec3(writer, m.x_axis)?;
    write_vec3(writer, m.y_axis)?;
    write_vec3(writer, m.z_axis)?;
    Ok(())
}

/// Parameters a snapshot does not carry (constitutive and numerical tuning) but
/// a freshly constructed [`Solver`] still needs; grid shape and spacing, in
/// contrast, are read back from the file itself.
pub struct LoadParams {
    pub mu0: f64,
    pub lambda0: f64,
    pub xi: f64,
    pub theta_c: f64,
    pub theta_s: f64,
    pub alpha: f64,
    pub beta: f64,
    pub implicit: bool,
}

/// Rebuild a [`Solver`] from a `.snowstate` stream, reusing the file's grid
/// shape and spacing and `extra` for everything else. A version mismatch or a
/// truncated file surfaces as [`SolverError::Io`]/[`SolverError::VersionMismatch`],
/// never a panic.
pub fn load_state<R: Read>(mut reader: R, extra: LoadParams) -> Result<Solver> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a snowstate file").into());
    }

    let version = read_u32(&mut reader)?;
    if version != VERSION {
        return Err(SolverError::VersionMismatch {
            expected: VERSION,
            found: version,
        });
    }

    let nx = read_u32(&mut reader)? as usize;
    let ny = read_u32(&mut reader)? as usize;
    let nz = read_u32(&mut reader)? as usize;
    let h = read_f64(&mut reader)?;

    let params = SolverParams {
        h,
        grid_dims: (nx, ny, nz),
        mu0: extra.mu0,
        lambda0: extra.lambda0,
        xi: extra.xi,
        theta_c: extra.theta_c,
        theta_s: extra.theta_s,
        alpha: extra.alpha,
        beta: extra.beta,
        implicit: extra.implicit,
    };
    let mut solver = Solver::new(params)?;

    let particle_count = read_u64(&mut reader)? as usize;
    for _ in 0..particle_count {
        read_particle(&mut reader, &mut solver)?;
    }
    Ok(solver)
}

fn read_particle<R: Read>(reader: &mut R, solver: &mut Solver) -> Result<()> {
    let position = read_vec3(reader)?;
    let velocity = read_vec3(reader)?;
    let mass = read_f64(reader)?;
    let volume0 = read_f64(reader)?;
    let deform_elastic = read_mat3(reader)?;
    let deform_plastic = read_mat3(reader)?;

    solver.add_particle(position, mass, velocity)?;
    let particle = solver
        .particles_mut()
        .last_mut()
        .expect("just pushed a particle");
    particle.volume0 = if volume0 > 0.0 { Some(volume0) } else { None };
    particle.deform_elastic = deform_elastic;
    particle.deform_plastic = deform_plastic;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_vec3<R: Read>(reader: &mut R) -> io::Result<DVec3> {
    Ok(DVec3::new(read_f64(reader)?, read_f64(reader)?, read_f64(reader)?))
}

fn read_mat3<R: Read>(reader: &mut R) -> io::Result<DMat3> {
    Ok(DMat3::from_cols(
        read_vec3(reader)?,
        read_vec3(reader)?,
        read_vec3(reader)?,
    ))
}
