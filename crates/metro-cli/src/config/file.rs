use crate::error::{CliError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A vector written either as `"x y z"` or as `[x, y, z]`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileVector {
    Components([f64; 3]),
    Text(String),
}

/// A box edge given once for a cube or per axis.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileLength {
    Scalar(f64),
    Vector(FileVector),
}

/// Names written either space separated or as an array.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileNames {
    List(Vec<String>),
    Text(String),
}

impl FileNames {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(names) => names,
            Self::Text(text) => text.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Isotropic polarizability, or the upper triangle `"xx xy xz yy yz zz"` of the tensor.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FilePolarizability {
    Scalar(f64),
    Tensor(String),
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileAtom {
    pub q: Option<f64>,
    pub sigma: Option<f64>,
    /// Radius; `sigma` defaults to twice this value.
    pub r: Option<f64>,
    pub eps: Option<f64>,
    pub dp: Option<f64>,
    /// Degrees.
    pub dprot: Option<f64>,
    pub mu: Option<FileVector>,
    pub alpha: Option<FilePolarizability>,
    pub mw: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileBond {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub k: f64,
    pub req: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FileStructure {
    /// Coordinate file.
    Path(PathBuf),
    /// `[{ "MM": [0, 0, 0] }, ...]`, one single-entry map per atom.
    Inline(Vec<BTreeMap<String, FileVector>>),
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileMolecule {
    pub atoms: Option<FileNames>,
    #[serde(rename = "Ninit")]
    pub n_init: Option<usize>,
    pub atomic: Option<bool>,
    #[serde(alias = "rotate")]
    pub rotatable: Option<bool>,
    pub structure: Option<FileStructure>,
    /// Keyed by `"i j"` atom index pairs.
    #[serde(default)]
    pub bonds: BTreeMap<String, FileBond>,
    pub insdir: Option<FileVector>,
    pub insoffset: Option<FileVector>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileEwald {
    pub cutoff: Option<f64>,
    pub alpha: Option<f64>,
    #[serde(rename = "cutoffK")]
    pub cutoff_k: Option<f64>,
    pub eps_surf: Option<f64>,
    pub spherical_sum: Option<bool>,
    pub update_frequency: Option<u64>,
    pub epsr: Option<f64>,
}

/// Older documents nest the dielectric settings in a `coulomb` block.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileCoulomb {
    pub epsr: Option<f64>,
    pub cutoff: Option<f64>,
    pub eps_rf: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileNonbonded {
    pub coulombtype: Option<String>,
    pub epsr: Option<f64>,
    pub cutoff: Option<f64>,
    pub eps_rf: Option<f64>,
    pub alpha: Option<f64>,
    pub debyelength: Option<f64>,
    pub ionicstrength: Option<f64>,
    pub ljcutoff: Option<f64>,
    pub ewald: Option<FileEwald>,
    pub coulomb: Option<FileCoulomb>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileEnergy {
    #[serde(default)]
    pub nonbonded: FileNonbonded,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileProcess {
    pub bound: String,
    pub free: String,
    #[serde(rename = "pKd")]
    pub pkd: f64,
    #[serde(rename = "pX")]
    pub px: f64,
}

/// Titration processes named by reference or defined in place.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FileProcessSelection {
    Names(FileNames),
    Definitions(BTreeMap<String, FileProcess>),
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileMoveParams {
    pub prob: Option<f64>,
    pub dp: Option<f64>,
    pub dprot: Option<f64>,
    pub dir: Option<FileVector>,
    pub peratom: Option<bool>,
    pub permol: Option<bool>,
    pub minlen: Option<usize>,
    pub maxlen: Option<usize>,
    pub threshold: Option<f64>,
    pub clustergroup: Option<FileNames>,
    pub pressure: Option<f64>,
    pub processes: Option<FileProcessSelection>,
}

/// A move section is either one parameter block or a map from molecule name to blocks.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FileMoveEntry {
    Global(FileMoveParams),
    Targets(BTreeMap<String, FileMoveParams>),
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileRandom {
    #[serde(default)]
    pub hardware: bool,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileMoves {
    pub random: Option<FileRandom>,
    #[serde(flatten)]
    pub entries: BTreeMap<String, FileMoveEntry>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileRdfPair {
    pub name1: String,
    pub name2: String,
    pub dim: Option<u8>,
    pub dr: Option<f64>,
    pub file: PathBuf,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileSampler {
    pub nstep: Option<u64>,
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub pairs: Vec<FileRdfPair>,
    pub dr: Option<f64>,
    #[serde(rename = "dV")]
    pub dv: Option<f64>,
    pub mollist: Option<FileNames>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileGeometry {
    /// `cuboid`, `slab` or `sphere`; inferred from the given dimensions when absent.
    pub shape: Option<String>,
    pub length: Option<FileLength>,
    pub radius: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileMcLoop {
    #[serde(rename = "macro")]
    pub macro_steps: Option<u64>,
    #[serde(rename = "micro")]
    pub micro_steps: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileUnitTest {
    pub testfile: PathBuf,
    #[serde(default)]
    pub stable: bool,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileSystem {
    pub temperature: Option<f64>,
    pub geometry: Option<FileGeometry>,
    pub mcloop: Option<FileMcLoop>,
    pub unittest: Option<FileUnitTest>,
    pub drift_tolerance: Option<f64>,
    pub drift_interval: Option<u64>,
    pub statefile: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// The configuration document as written on disk.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct FileConfig {
    #[serde(default)]
    pub atomlist: BTreeMap<String, FileAtom>,
    #[serde(default)]
    pub moleculelist: BTreeMap<String, FileMolecule>,
    #[serde(default)]
    pub energy: FileEnergy,
    #[serde(default)]
    pub processes: BTreeMap<String, FileProcess>,
    #[serde(default)]
    pub moves: FileMoves,
    #[serde(default)]
    pub analysis: BTreeMap<String, FileSampler>,
    #[serde(default)]
    pub system: FileSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// TOML for `.toml` files, JSON for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Self::parse(&content, FileFormat::from_path(path)).map_err(|source| CliError::FileParsing {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str, format: FileFormat) -> anyhow::Result<Self> {
        Ok(match format {
            FileFormat::Json => serde_json::from_str(content)?,
            FileFormat::Toml => toml::from_str(content)?,
        })
    }
}

/// Entries whose key starts with `_` are switched off.
pub fn is_disabled(key: &str) -> bool {
    key.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLYMERS: &str = r#"{
        "atomlist": {
            "Cl": { "q": -1.0, "r": 2.0, "dp": 110 },
            "MM": { "q": 1.0, "r": 3.0, "dp": 10, "mu": "0 0 1.5" }
        },
        "moleculelist": {
            "counterions": { "atoms": "Cl", "atomic": true, "Ninit": 32 },
            "polymer": {
                "atoms": "MM MM MM", "Ninit": 8,
                "bonds": { "0 1": { "type": "harmonic", "k": 0.0557, "req": 0.0 } }
            }
        },
        "energy": { "nonbonded": { "coulomb": { "epsr": 78.7 } } },
        "moves": {
            "random": { "hardware": false },
            "atomtranslate": {
                "counterions": { "prob": 1.0, "peratom": true },
                "_polymer": { "prob": 1.0 }
            },
            "isobaric": { "dp": 2, "pressure": 113.2, "prob": 0.1 }
        },
        "analysis": {
            "polymershape": { "nstep": 10, "mollist": [ "polymer" ] },
            "statefile": { "file": "state" }
        },
        "system": {
            "geometry": { "radius": 100 },
            "mcloop": { "macro": 10, "micro": 20000 },
            "unittest": { "testfile": "polymers.test", "stable": false }
        }
    }"#;

    #[test]
    fn json_document_parses_into_sections() {
        let config = FileConfig::parse(POLYMERS, FileFormat::Json).unwrap();
        assert_eq!(config.atomlist.len(), 2);
        assert_eq!(config.atomlist["MM"].mu, Some(FileVector::Text("0 0 1.5".into())));
        assert_eq!(config.moleculelist["polymer"].bonds["0 1"].k, 0.0557);
        assert_eq!(
            config.energy.nonbonded.coulomb.as_ref().and_then(|c| c.epsr),
            Some(78.7)
        );
        assert_eq!(config.moves.random.as_ref().map(|r| r.hardware), Some(false));
        assert!(matches!(config.moves.entries["isobaric"], FileMoveEntry::Global(_)));
        let FileMoveEntry::Targets(targets) = &config.moves.entries["atomtranslate"] else {
            panic!("expected per-molecule move entries");
        };
        assert_eq!(targets["counterions"].peratom, Some(true));
        assert!(targets.contains_key("_polymer"));
        assert_eq!(config.analysis["polymershape"].nstep, Some(10));
        let mcloop = config.system.mcloop.unwrap();
        assert_eq!((mcloop.macro_steps, mcloop.micro_steps), (Some(10), Some(20000)));
    }

    #[test]
    fn toml_document_parses_like_json() {
        let content = r#"
            [atomlist.Na]
            q = 1
            sigma = 3.33

            [moleculelist.salt]
            atoms = ["Na"]
            atomic = true
            Ninit = 4

            [moves.atomtranslate.salt]
            peratom = true

            [system]
            temperature = 298.15
            geometry = { length = [10.0, 10.0, 20.0] }
            mcloop = { macro = 2, micro = 5 }
        "#;
        let config = FileConfig::parse(content, FileFormat::Toml).unwrap();
        assert_eq!(config.atomlist["Na"].q, Some(1.0));
        assert_eq!(
            config.system.geometry.unwrap().length,
            Some(FileLength::Vector(FileVector::Components([10.0, 10.0, 20.0])))
        );
        assert_eq!(
            config.moleculelist["salt"].atoms.clone().map(FileNames::into_vec),
            Some(vec!["Na".to_string()])
        );
    }

    #[test]
    fn titration_processes_accept_names_or_definitions() {
        let content = r#"{ "moves": {
            "titrate": { "prob": 0.1, "processes": { "H-Asp": { "bound": "HASP", "free": "ASP", "pKd": 4.0, "pX": 7.0 } } }
        } }"#;
        let config = FileConfig::parse(content, FileFormat::Json).unwrap();
        let FileMoveEntry::Global(params) = &config.moves.entries["titrate"] else {
            panic!("expected a global move entry");
        };
        let Some(FileProcessSelection::Definitions(defs)) = &params.processes else {
            panic!("expected inline process definitions");
        };
        assert_eq!(defs["H-Asp"].pkd, 4.0);
    }

    #[test]
    fn unknown_atom_parameter_is_rejected() {
        let content = r#"{ "atomlist": { "Na": { "q": 1.0, "charge_radius": 2.0 } } }"#;
        assert!(FileConfig::parse(content, FileFormat::Json).is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(FileFormat::from_path(Path::new("run.toml")), FileFormat::Toml);
        assert_eq!(FileFormat::from_path(Path::new("run.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("simulation")), FileFormat::Json);
    }

    #[test]
    fn missing_file_is_a_parsing_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileConfig::from_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn underscore_keys_are_disabled() {
        assert!(is_disabled("_xtcfile"));
        assert!(!is_disabled("trajectory"));
    }
}
