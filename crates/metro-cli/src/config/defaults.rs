pub struct DefaultsConfig {
    pub temperature: f64,
    pub coulombtype: &'static str,
    pub move_weight: f64,
    pub direction: [f64; 3],
    pub chain_min_len: usize,
    pub chain_max_len: usize,
    pub ewald_cutoff_k: f64,
    pub ewald_spherical_sum: bool,
    pub ewald_update_frequency: u64,
    pub rdf_dim: u8,
    pub rdf_dr: f64,
    pub kirkwood_dr: f64,
    pub kirkwood_file: &'static str,
    pub energy_file: &'static str,
    pub state_file: &'static str,
    pub coordinate_file: &'static str,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperature: 298.15,
            coulombtype: "plain",
            move_weight: 1.0,
            direction: [1.0, 1.0, 1.0],
            chain_min_len: 1,
            chain_max_len: 10,
            ewald_cutoff_k: 5.0,
            ewald_spherical_sum: true,
            ewald_update_frequency: 1000,
            rdf_dim: 3,
            rdf_dr: 0.1,
            kirkwood_dr: 0.1,
            kirkwood_file: "kirkwood.dat",
            energy_file: "energy.dat",
            state_file: "state",
            coordinate_file: "confout.aam",
        }
    }
}
