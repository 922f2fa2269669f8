use super::defaults::DefaultsConfig;
use super::file::{
    FileAtom, FileConfig, FileGeometry, FileLength, FileMolecule, FileMoveEntry, FileMoveParams,
    FileNonbonded, FilePolarizability, FileProcess, FileProcessSelection, FileSampler,
    FileStructure, FileVector, is_disabled,
};
use super::models::AppConfig;
use crate::cli::Cli;
use crate::error::Result;
use metropp::core::forcefield::electrostatics::EwaldParameters;
use metropp::core::geometry::Geometry;
use metropp::engine::analysis::SamplerTag;
use metropp::engine::config::{
    AnalysisConfig, AtomConfig, BondConfig, ChainMoveConfig, ConfigError, ElectrostaticsConfig,
    EnergyConfig, MoleculeConfig, MoveConfig, ProcessConfig, RdfPairConfig, Screening, Seed,
    SimulationConfigBuilder, StructureSource, UnitTestConfig,
};
use metropp::engine::moves::MoveTag;
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

type ConvertResult<T> = std::result::Result<T, ConfigError>;

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        reason: reason.into(),
    }
}

pub fn build_config(cli: &Cli) -> Result<AppConfig> {
    let file_config = FileConfig::from_file(&cli.config)?;
    info!("Converting configuration from {:?}", &cli.config);
    let mut builder = to_builder(file_config, &DefaultsConfig::default())?;
    if let Some(state) = &cli.state {
        debug!("State file overridden on the command line: {:?}", state);
        builder = builder.state_file(Some(state.clone()));
    }
    Ok(AppConfig {
        config_path: cli.config.clone(),
        core_config: builder.build()?,
    })
}

/// Converts the on-disk document into a core builder; cross references are checked later by
/// [`SimulationConfigBuilder::build`].
pub fn to_builder(file: FileConfig, defaults: &DefaultsConfig) -> ConvertResult<SimulationConfigBuilder> {
    let mut builder = SimulationConfigBuilder::new();

    for (name, atom) in enabled(file.atomlist) {
        builder = builder.atom(convert_atom(&name, atom)?);
    }
    for (name, molecule) in enabled(file.moleculelist) {
        builder = builder.molecule(convert_molecule(&name, molecule)?);
    }
    builder = builder.energy(convert_energy(file.energy.nonbonded, defaults)?);

    let mut processes: BTreeMap<String, FileProcess> = enabled(file.processes).collect();
    let mut moves = Vec::new();
    for (tag, entry) in enabled(file.moves.entries) {
        let tag_kind = MoveTag::parse(&tag)?;
        match (tag_kind.is_targeted(), entry) {
            (true, FileMoveEntry::Targets(targets)) => {
                for (molecule, params) in enabled(targets) {
                    moves.push(convert_targeted_move(tag_kind, molecule, params, defaults)?);
                }
            }
            (false, FileMoveEntry::Global(params)) => {
                moves.push(convert_global_move(tag_kind, params, &mut processes, defaults)?);
            }
            (true, _) => return Err(invalid(format!("moves.{tag}"), "expects one entry per molecule")),
            (false, _) => return Err(invalid(format!("moves.{tag}"), "expects a single parameter block")),
        }
    }
    for (name, process) in processes {
        builder = builder.process(ProcessConfig {
            name,
            bound: process.bound,
            free: process.free,
            pkd: process.pkd,
            px: process.px,
        });
    }
    for mv in moves {
        builder = builder.add_move(mv);
    }

    for (tag, sampler) in enabled(file.analysis) {
        builder = builder.analysis(convert_sampler(&tag, sampler, defaults)?);
    }

    let system = file.system;
    builder = builder.temperature(system.temperature.unwrap_or(defaults.temperature));
    if let Some(geometry) = system.geometry {
        builder = builder.geometry(convert_geometry(geometry)?);
    }
    if let Some(mcloop) = system.mcloop {
        let macro_steps = mcloop
            .macro_steps
            .ok_or(ConfigError::MissingParameter("system.mcloop.macro"))?;
        let micro_steps = mcloop
            .micro_steps
            .ok_or(ConfigError::MissingParameter("system.mcloop.micro"))?;
        builder = builder.mc_loop(macro_steps, micro_steps);
    }
    let hardware = file.moves.random.is_some_and(|r| r.hardware);
    builder = builder.seed(match (hardware, system.seed) {
        (true, _) => Seed::Hardware,
        (false, Some(seed)) => Seed::Fixed(seed),
        (false, None) => Seed::Fixed(metropp::engine::config::DEFAULT_SEED),
    });
    if let Some(tolerance) = system.drift_tolerance {
        builder = builder.drift_tolerance(tolerance);
    }
    Ok(builder
        .drift_interval(system.drift_interval)
        .unittest(system.unittest.map(|u| UnitTestConfig {
            file: u.testfile,
            stable: u.stable,
        }))
        .state_file(system.statefile))
}

fn enabled<V>(entries: BTreeMap<String, V>) -> impl Iterator<Item = (String, V)> {
    entries.into_iter().filter(|(key, _)| {
        let disabled = is_disabled(key);
        if disabled {
            debug!("Skipping disabled entry '{}'", key);
        }
        !disabled
    })
}

fn parse_vector(key: &str, vector: &FileVector) -> ConvertResult<Vector3<f64>> {
    match vector {
        FileVector::Components([x, y, z]) => Ok(Vector3::new(*x, *y, *z)),
        FileVector::Text(text) => {
            let values = parse_numbers(key, text)?;
            match values.as_slice() {
                [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
                _ => Err(invalid(key, format!("expected three components, got '{text}'"))),
            }
        }
    }
}

fn parse_numbers(key: &str, text: &str) -> ConvertResult<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| invalid(key, format!("'{token}' is not a number")))
        })
        .collect()
}

fn convert_atom(name: &str, atom: FileAtom) -> ConvertResult<AtomConfig> {
    let key = format!("atomlist.{name}");
    let mut config = AtomConfig::new(name);
    config.charge = atom.q.unwrap_or(0.0);
    config.sigma = atom.sigma.or(atom.r.map(|r| 2.0 * r)).unwrap_or(0.0);
    config.epsilon = atom.eps.unwrap_or(0.0);
    config.dp = atom.dp.unwrap_or(0.0);
    config.dprot = atom.dprot.unwrap_or(0.0).to_radians();
    config.dipole = atom
        .mu
        .map(|mu| parse_vector(&format!("{key}.mu"), &mu))
        .transpose()?
        .filter(|mu| mu.norm() > 0.0);
    config.polarizability = match atom.alpha {
        None => None,
        Some(FilePolarizability::Scalar(alpha)) => Some(alpha),
        Some(FilePolarizability::Tensor(text)) => {
            let alpha_key = format!("{key}.alpha");
            match parse_numbers(&alpha_key, &text)?.as_slice() {
                [] => None,
                [xx, _, _, yy, _, zz] => Some((xx + yy + zz) / 3.0),
                _ => return Err(invalid(alpha_key, "expected six tensor components")),
            }
        }
    };
    if let Some(mw) = atom.mw {
        config.molar_mass = mw;
    }
    Ok(config)
}

fn convert_molecule(name: &str, molecule: FileMolecule) -> ConvertResult<MoleculeConfig> {
    let key = format!("moleculelist.{name}");
    let mut config = MoleculeConfig::new(name);
    config.atoms = molecule.atoms.map(|a| a.into_vec()).unwrap_or_default();
    config.n_init = molecule.n_init.unwrap_or(0);
    config.atomic = molecule.atomic.unwrap_or(false);
    config.rotatable = molecule.rotatable.unwrap_or(true);
    config.structure = match molecule.structure {
        None => None,
        Some(FileStructure::Path(path)) => Some(StructureSource::File(path)),
        Some(FileStructure::Inline(entries)) => {
            let mut records = Vec::with_capacity(entries.len());
            for entry in entries {
                let mut iter = entry.into_iter();
                match (iter.next(), iter.next()) {
                    (Some((atom, position)), None) => {
                        let p = parse_vector(&format!("{key}.structure"), &position)?;
                        records.push((atom, Point3::from(p)));
                    }
                    _ => {
                        return Err(invalid(
                            format!("{key}.structure"),
                            "each entry must map one atom name to a position",
                        ));
                    }
                }
            }
            Some(StructureSource::Inline(records))
        }
    };
    for (pair, bond) in molecule.bonds {
        let bond_key = format!("{key}.bonds.{pair}");
        if let Some(kind) = bond.kind.as_deref() {
            if kind != "harmonic" {
                return Err(invalid(bond_key, format!("unsupported bond type '{kind}'")));
            }
        }
        let indices: Vec<usize> = pair
            .split_whitespace()
            .map(|t| t.parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid(&bond_key, "expected two atom indices"))?;
        let [first, second] = indices.as_slice() else {
            return Err(invalid(bond_key, "expected two atom indices"));
        };
        config.bonds.push(BondConfig {
            first: *first,
            second: *second,
            k: bond.k,
            req: bond.req,
        });
    }
    if let Some(insdir) = &molecule.insdir {
        config.insertion_direction = parse_vector(&format!("{key}.insdir"), insdir)?;
    }
    if let Some(insoffset) = &molecule.insoffset {
        config.insertion_offset = parse_vector(&format!("{key}.insoffset"), insoffset)?;
    }
    Ok(config)
}

fn convert_energy(nonbonded: FileNonbonded, defaults: &DefaultsConfig) -> ConvertResult<EnergyConfig> {
    let ewald_epsr = nonbonded.ewald.as_ref().and_then(|e| e.epsr);
    let coulomb = nonbonded.coulomb.unwrap_or_default();
    let epsr = nonbonded.epsr.or(coulomb.epsr).unwrap_or(1.0);
    let cutoff = nonbonded.cutoff.or(coulomb.cutoff);
    let eps_rf = nonbonded.eps_rf.or(coulomb.eps_rf);
    let scheme = nonbonded
        .coulombtype
        .as_deref()
        .unwrap_or(defaults.coulombtype)
        .to_ascii_lowercase();

    let electrostatics = match scheme.as_str() {
        "none" => ElectrostaticsConfig::None,
        "plain" => ElectrostaticsConfig::Plain { cutoff, eps_rf },
        "wolf" => ElectrostaticsConfig::Wolf {
            alpha: nonbonded
                .alpha
                .ok_or(ConfigError::MissingParameter("energy.nonbonded.alpha"))?,
            cutoff: cutoff.ok_or(ConfigError::MissingParameter("energy.nonbonded.cutoff"))?,
        },
        "yonezawa" => ElectrostaticsConfig::Wolf {
            alpha: 0.0,
            cutoff: cutoff.ok_or(ConfigError::MissingParameter("energy.nonbonded.cutoff"))?,
        },
        "ewald" => {
            let ewald = nonbonded.ewald.unwrap_or_default();
            ElectrostaticsConfig::Ewald(EwaldParameters {
                alpha: ewald
                    .alpha
                    .or(nonbonded.alpha)
                    .ok_or(ConfigError::MissingParameter("energy.nonbonded.ewald.alpha"))?,
                cutoff: ewald
                    .cutoff
                    .or(cutoff)
                    .ok_or(ConfigError::MissingParameter("energy.nonbonded.ewald.cutoff"))?,
                cutoff_k: ewald.cutoff_k.unwrap_or(defaults.ewald_cutoff_k),
                eps_surf: ewald.eps_surf,
                spherical_sum: ewald.spherical_sum.unwrap_or(defaults.ewald_spherical_sum),
                update_frequency: ewald
                    .update_frequency
                    .unwrap_or(defaults.ewald_update_frequency),
            })
        }
        "yukawa" => {
            let screening = match (nonbonded.debyelength, nonbonded.ionicstrength) {
                (Some(length), _) => Screening::DebyeLength(length),
                (None, Some(strength)) => Screening::IonicStrength(strength),
                (None, None) => {
                    return Err(ConfigError::MissingParameter("energy.nonbonded.debyelength"));
                }
            };
            ElectrostaticsConfig::Yukawa { screening, cutoff }
        }
        other => {
            return Err(ConfigError::UnknownTag {
                section: "energy.nonbonded.coulombtype",
                tag: other.to_string(),
            });
        }
    };
    let epsr = match (&electrostatics, ewald_epsr) {
        (ElectrostaticsConfig::Ewald(_), Some(ewald_epsr)) if nonbonded.epsr.is_none() => ewald_epsr,
        _ => epsr,
    };
    Ok(EnergyConfig {
        epsr,
        electrostatics,
        lj_cutoff: nonbonded.ljcutoff,
    })
}

fn direction(key: &str, params: &FileMoveParams, defaults: &DefaultsConfig) -> ConvertResult<Vector3<f64>> {
    match &params.dir {
        Some(dir) => parse_vector(key, dir),
        None => Ok(Vector3::from(defaults.direction)),
    }
}

fn convert_targeted_move(
    tag: MoveTag,
    molecule: String,
    params: FileMoveParams,
    defaults: &DefaultsConfig,
) -> ConvertResult<MoveConfig> {
    let weight = params.prob.unwrap_or(defaults.move_weight);
    let dir_key = format!("moves.{molecule}.dir");
    let chain = |params: &FileMoveParams, molecule: String| ChainMoveConfig {
        molecule,
        dp: params.dp.unwrap_or(0.0),
        min_len: params.minlen.unwrap_or(defaults.chain_min_len),
        max_len: params.maxlen.unwrap_or(defaults.chain_max_len),
        per_molecule: params.permol.unwrap_or(false),
        weight,
    };
    Ok(match tag {
        MoveTag::AtomTranslate => MoveConfig::AtomTranslate {
            direction: direction(&dir_key, &params, defaults)?,
            molecule,
            dp: params.dp,
            per_atom: params.peratom.unwrap_or(false),
            weight,
        },
        MoveTag::AtomRotate => MoveConfig::AtomRotate {
            molecule,
            dprot: params.dprot,
            per_atom: params.peratom.unwrap_or(false),
            weight,
        },
        MoveTag::MoleculeTransRot => MoveConfig::MoleculeTransRot {
            direction: direction(&dir_key, &params, defaults)?,
            molecule,
            dp: params.dp.unwrap_or(0.0),
            dprot: params.dprot.unwrap_or(0.0),
            per_molecule: params.permol.unwrap_or(false),
            weight,
        },
        MoveTag::Crankshaft => MoveConfig::Crankshaft(chain(&params, molecule)),
        MoveTag::Pivot => MoveConfig::Pivot(chain(&params, molecule)),
        MoveTag::Cluster => MoveConfig::Cluster {
            direction: direction(&dir_key, &params, defaults)?,
            molecule,
            dp: params.dp.unwrap_or(0.0),
            dprot: params.dprot.unwrap_or(0.0),
            threshold: params
                .threshold
                .ok_or(ConfigError::MissingParameter("moves.moltransrotcluster.threshold"))?,
            cluster_molecules: params.clustergroup.map(|g| g.into_vec()).unwrap_or_default(),
            weight,
        },
        MoveTag::Isobaric | MoveTag::Titration => {
            return Err(invalid(format!("moves.{molecule}"), "global move given per molecule"));
        }
    })
}

fn convert_global_move(
    tag: MoveTag,
    params: FileMoveParams,
    processes: &mut BTreeMap<String, FileProcess>,
    defaults: &DefaultsConfig,
) -> ConvertResult<MoveConfig> {
    let weight = params.prob.unwrap_or(defaults.move_weight);
    match tag {
        MoveTag::Isobaric => Ok(MoveConfig::Isobaric {
            dp: params.dp.unwrap_or(0.0),
            pressure: params
                .pressure
                .ok_or(ConfigError::MissingParameter("moves.isobaric.pressure"))?,
            weight,
        }),
        MoveTag::Titration => {
            let selected = match params.processes {
                None => Vec::new(),
                Some(FileProcessSelection::Names(names)) => names.into_vec(),
                Some(FileProcessSelection::Definitions(definitions)) => {
                    let mut names = Vec::new();
                    for (name, process) in enabled(definitions) {
                        if processes.get(&name).is_some_and(|p| *p != process) {
                            return Err(ConfigError::Duplicate {
                                section: "processes",
                                name,
                            });
                        }
                        processes.insert(name.clone(), process);
                        names.push(name);
                    }
                    names
                }
            };
            Ok(MoveConfig::Titration {
                processes: selected,
                weight,
            })
        }
        _ => Err(invalid("moves", "molecular move given without a target molecule")),
    }
}

fn convert_sampler(tag: &str, sampler: FileSampler, defaults: &DefaultsConfig) -> ConvertResult<AnalysisConfig> {
    let nstep = || {
        sampler
            .nstep
            .ok_or(ConfigError::MissingParameter("analysis.nstep"))
    };
    let file_or = |default: &str| sampler.file.clone().unwrap_or_else(|| PathBuf::from(default));
    let pairs = || {
        sampler
            .pairs
            .iter()
            .map(|p| RdfPairConfig {
                first: p.name1.clone(),
                second: p.name2.clone(),
                dr: p.dr.unwrap_or(defaults.rdf_dr),
                dim: p.dim.unwrap_or(defaults.rdf_dim),
                file: p.file.clone(),
            })
            .collect::<Vec<_>>()
    };
    Ok(match SamplerTag::parse(tag)? {
        SamplerTag::AtomRdf => AnalysisConfig::AtomRdf {
            interval: nstep()?,
            pairs: pairs(),
        },
        SamplerTag::MolRdf => AnalysisConfig::MolRdf {
            interval: nstep()?,
            pairs: pairs(),
        },
        SamplerTag::Kirkwood => AnalysisConfig::Kirkwood {
            interval: nstep()?,
            dr: sampler.dr.unwrap_or(defaults.kirkwood_dr),
            file: file_or(defaults.kirkwood_file),
        },
        SamplerTag::Multipole => AnalysisConfig::Multipole {
            interval: nstep()?,
            file: sampler.file.clone(),
        },
        SamplerTag::Virial => AnalysisConfig::Virial {
            interval: nstep()?,
            file: sampler.file.clone(),
        },
        SamplerTag::VirtualVolume => AnalysisConfig::VirtualVolume {
            interval: nstep()?,
            dv: sampler
                .dv
                .ok_or(ConfigError::MissingParameter("analysis.virtualvolume.dV"))?,
            file: sampler.file.clone(),
        },
        SamplerTag::PolymerShape => AnalysisConfig::PolymerShape {
            interval: nstep()?,
            molecules: sampler
                .mollist
                .clone()
                .ok_or(ConfigError::MissingParameter("analysis.polymershape.mollist"))?
                .into_vec(),
            file: sampler.file.clone(),
        },
        SamplerTag::Trajectory => AnalysisConfig::Trajectory {
            interval: nstep()?,
            file: sampler
                .file
                .clone()
                .ok_or(ConfigError::MissingParameter("analysis.trajectory.file"))?,
        },
        SamplerTag::EnergyLog => AnalysisConfig::EnergyLog {
            interval: nstep()?,
            file: file_or(defaults.energy_file),
        },
        SamplerTag::StateFile => AnalysisConfig::StateFile {
            interval: sampler.nstep,
            file: file_or(defaults.state_file),
        },
        SamplerTag::CoordinateFile => AnalysisConfig::CoordinateFile {
            file: file_or(defaults.coordinate_file),
        },
    })
}

fn convert_geometry(geometry: FileGeometry) -> ConvertResult<Geometry> {
    let lengths = |length: Option<&FileLength>| -> ConvertResult<Vector3<f64>> {
        match length {
            Some(FileLength::Scalar(side)) => Ok(Vector3::repeat(*side)),
            Some(FileLength::Vector(vector)) => parse_vector("system.geometry.length", vector),
            None => Err(ConfigError::MissingParameter("system.geometry.length")),
        }
    };
    let shape = match (geometry.shape.as_deref(), geometry.radius) {
        (Some(shape), _) => shape.to_ascii_lowercase(),
        (None, Some(_)) => "sphere".to_string(),
        (None, None) => "cuboid".to_string(),
    };
    let result = match shape.as_str() {
        "cuboid" => Geometry::cuboid(lengths(geometry.length.as_ref())?),
        "slab" => Geometry::slab(lengths(geometry.length.as_ref())?),
        "sphere" => Geometry::sphere(
            geometry
                .radius
                .ok_or(ConfigError::MissingParameter("system.geometry.radius"))?,
        ),
        other => {
            return Err(ConfigError::UnknownTag {
                section: "geometry",
                tag: other.to_string(),
            });
        }
    };
    result.map_err(|e| invalid("system.geometry", e.to_string()))
}
