//! Photoionization input decks.
//!
//! One deck per zone, rendered from the zone parameter table and the header of
//! the zone's handoff file.

use std::fmt::Write as _;

use crate::domain::models::{
    DustKind, ExtraOutputs, PhotoionizationConfig, TableOptions, ZoneComposition,
    ZoneParameters,
};

/// Helium mass fraction of the solver's default abundance set.
pub const DEFAULT_HELIUM_FRACTION: f64 = 0.250_573_900_879_969_67;
/// Metallicity of the solver's default abundance set.
pub const DEFAULT_METALLICITY: f64 = 0.013_429_440_431_189_1;
/// Dust-to-gas ratio of the default grain mix, PAH included.
pub const DEFAULT_DUST_TO_GAS: f64 = 0.006_606;
/// PAH mass fraction of the default grain mix.
pub const DEFAULT_PAH_FRACTION: f64 = 0.003_962_761_126_248_864;
/// PAH mass fraction imposed on every zone.
pub const FORCED_PAH_FRACTION: f64 = 0.05;
/// Rydberg constant in m^-1.
pub const RYDBERG: f64 = 10_973_731.57;

/// Convert a wavelength in nm to photon energy in Rydberg.
pub fn nm_to_rydberg(wavelength_nm: f64) -> f64 {
    1.0 / (wavelength_nm * 1e-9 * RYDBERG)
}

/// File stem used for every file of one zone.
pub fn zone_stem(zone: usize) -> String {
    format!("zone{zone}")
}

/// Which deck to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckVariant {
    /// Regular deck with the configured physics and extra outputs.
    Standard,
    /// Crash fallback: quantum heating off and no extra outputs.
    NoQheatFallback,
}

/// Renders photoionization decks.
#[derive(Debug, Clone)]
pub struct DeckBuilder {
    disable_qheat: bool,
    enable_pah: bool,
    cosmic_rays: bool,
    cmb: bool,
    extra_outputs: ExtraOutputs,
}

impl DeckBuilder {
    /// Deck builder for the photoionization settings in `config`.
    pub fn new(config: &PhotoionizationConfig) -> Self {
        Self {
            disable_qheat: config.disable_qheat,
            enable_pah: config.enable_pah,
            cosmic_rays: config.cosmic_rays,
            cmb: config.cmb,
            extra_outputs: config.extra_outputs.clone(),
        }
    }

    /// Whether standard decks already run without quantum heating.
    pub const fn qheat_disabled(&self) -> bool {
        self.disable_qheat
    }

    /// Render the deck for `zone`.
    ///
    /// `sed_header` is the text of the zone's handoff file; its `intensity` or
    /// `nuf(nu)` comment line becomes the normalization command.
    pub fn render(
        &self,
        zone: usize,
        params: &ZoneParameters,
        options: TableOptions,
        sed_header: &str,
        variant: DeckVariant,
    ) -> String {
        let no_qheat = self.disable_qheat || variant == DeckVariant::NoQheatFallback;
        let mut deck = String::new();

        match variant {
            DeckVariant::Standard => {
                let _ = writeln!(deck, "title cloudy zone {zone}");
            }
            DeckVariant::NoQheatFallback => {
                let _ = writeln!(deck, "title cloudy zone {zone} no qheat run");
            }
        }
        self.write_chemistry(&mut deck, zone, params, options, no_qheat);
        self.write_radiation(&mut deck, params, sed_header);

        deck.push_str("## GEOMETRY\n");
        let _ = writeln!(
            deck,
            "stop thickness {} parsec linear",
            params.geometry.thickness()
        );
        deck.push_str("## OTHER OPTIONS\n");
        deck.push_str("stop temperature off\n");

        deck.push_str("## OUTPUTS\n");
        let _ = writeln!(deck, "save overview \"overview_zone{zone}.txt\" last");
        let _ = writeln!(
            deck,
            "save continuum \"spectra_zone{zone}.txt\" last units nm"
        );
        let _ = writeln!(deck, "save abundances \"composition_zone{zone}.txt\" last");
        let _ = writeln!(
            deck,
            "save optical depth \"tau_zone{zone}.txt\" last units nm"
        );

        match variant {
            DeckVariant::Standard => self.write_extra_outputs(&mut deck, zone),
            DeckVariant::NoQheatFallback => {
                deck.push_str("# extra outputs are disabled for fallback runs\n");
            }
        }
        deck
    }

    fn write_chemistry(
        &self,
        deck: &mut String,
        zone: usize,
        params: &ZoneParameters,
        options: TableOptions,
        no_qheat: bool,
    ) {
        let qheat = if no_qheat { " no qheat" } else { "" };
        deck.push_str("## CHEMICAL COMPOSITION\n");
        let _ = writeln!(deck, "hden {}", params.hydrogen_density.log10());

        match params.composition {
            ZoneComposition::AbundancesIsm => {
                deck.push_str("abundances ism no grains\n");
                if options.dust == DustKind::GrainsIsm {
                    let _ = writeln!(deck, "grains ism{qheat}");
                    if self.enable_pah {
                        let _ = writeln!(deck, "grains pah{qheat}");
                        deck.push_str("set pah constant\n");
                    }
                }
            }
            ZoneComposition::Metals {
                helium_fraction,
                metallicity,
            } => {
                deck.push_str("abundances gass\n");
                let _ = writeln!(
                    deck,
                    "element helium scale {}",
                    helium_fraction / DEFAULT_HELIUM_FRACTION
                );
                let _ = writeln!(deck, "metals {}", metallicity / DEFAULT_METALLICITY);

                if options.dust != DustKind::None {
                    // Rescale from the default grain mix; unknown ratios keep it.
                    let dust_scale = match (options.dust, params.known_dust_to_gas()) {
                        (DustKind::DustToGas, Some(dtg)) => dtg / DEFAULT_DUST_TO_GAS,
                        _ => 1.0,
                    };
                    let grain_scale = if self.enable_pah {
                        dust_scale * (1.0 - FORCED_PAH_FRACTION)
                    } else {
                        dust_scale
                    };
                    let _ = writeln!(deck, "grains ism {grain_scale}{qheat}");

                    if self.enable_pah {
                        if no_qheat {
                            tracing::warn!(
                                zone,
                                "quantum heating is off; PAH emission features will be missing"
                            );
                        }
                        let pah_scale = dust_scale * FORCED_PAH_FRACTION / DEFAULT_PAH_FRACTION;
                        let _ = writeln!(deck, "grains pah {pah_scale}{qheat}");
                        deck.push_str("set pah constant\n");
                    }
                }
            }
        }

        if self.cosmic_rays {
            deck.push_str("cosmic rays background\n");
        }
    }

    fn write_radiation(&self, deck: &mut String, params: &ZoneParameters, sed_header: &str) {
        deck.push_str("## RADIATION FIELD\n");
        let _ = writeln!(deck, "table sed \"{}\"", params.sed_file.display());
        if let Some(normalization) = normalization_line(sed_header) {
            deck.push_str(normalization);
            deck.push('\n');
        }
        if self.cmb {
            deck.push_str("CMB\n");
        }
    }

    fn write_extra_outputs(&self, deck: &mut String, zone: usize) {
        let extra = &self.extra_outputs;
        if extra.emissivity {
            let _ = writeln!(
                deck,
                "save diffuse continuum \"emissivity_zone{zone}.txt\" last units nm"
            );
        }
        if extra.opacity {
            let _ = writeln!(
                deck,
                "save total opacities \"opacity_zone{zone}.txt\" last units nm"
            );
        }
        for wavelength in &extra.radiative_transfer_wavelengths {
            let _ = writeln!(
                deck,
                "save continuum emissivity {} \"radTransfer_{wavelength}nm_zone{zone}.txt\" last",
                nm_to_rydberg(*wavelength)
            );
        }
        if extra.grain_abundances {
            let _ = writeln!(
                deck,
                "save grain abundance \"grainAbundance_zone{zone}.txt\" last units nm"
            );
        }
        if extra.grain_dust_to_gas {
            let _ = writeln!(
                deck,
                "save grain D/G ratio \"grainDTG_zone{zone}.txt\" last units nm"
            );
        }
    }

    /// Result files a standard deck asks the solver to write for `zone`.
    pub fn output_files(&self, zone: usize) -> Vec<String> {
        let mut files = vec![
            format!("overview_zone{zone}.txt"),
            format!("spectra_zone{zone}.txt"),
            format!("composition_zone{zone}.txt"),
            format!("tau_zone{zone}.txt"),
        ];
        let extra = &self.extra_outputs;
        if extra.emissivity {
            files.push(format!("emissivity_zone{zone}.txt"));
        }
        if extra.opacity {
            files.push(format!("opacity_zone{zone}.txt"));
        }
        for wavelength in &extra.radiative_transfer_wavelengths {
            files.push(format!("radTransfer_{wavelength}nm_zone{zone}.txt"));
        }
        if extra.grain_abundances {
            files.push(format!("grainAbundance_zone{zone}.txt"));
        }
        if extra.grain_dust_to_gas {
            files.push(format!("grainDTG_zone{zone}.txt"));
        }
        files
    }
}

/// The normalization command carried in a handoff file's leading comments.
pub fn normalization_line(sed_text: &str) -> Option<&str> {
    sed_text
        .lines()
        .map(str::trim)
        .take_while(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim())
        .find(|line| line.starts_with("intensity") || line.starts_with("nuf(nu)"))
}
