//! Periodic table data and element lookup.

/// A chemical element with the data needed for valence and descriptor work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub name: &'static str,
    pub atomic_weight: f64,
    /// Allowed neutral valences in ascending order; empty means implicit
    /// hydrogens are never added (metals, noble gases treated as inert).
    pub valences: &'static [u8],
    /// Electrons in the outermost shell.
    pub valence_electrons: u8,
}

impl Element {
    /// Principal quantum number (period) of the element.
    pub fn period(&self) -> u8 {
        match self.atomic_number {
            0..=2 => 1,
            3..=10 => 2,
            11..=18 => 3,
            19..=36 => 4,
            37..=54 => 5,
            55..=86 => 6,
            _ => 7,
        }
    }

    /// Default (lowest) valence, if the element takes implicit hydrogens.
    pub fn default_valence(&self) -> Option<u8> {
        self.valences.first().copied()
    }
}

/// Highest atomic number in the table.
pub const MAX_ATOMIC_NUMBER: u8 = 118;

const fn el(
    atomic_number: u8,
    symbol: &'static str,
    name: &'static str,
    atomic_weight: f64,
    valences: &'static [u8],
    valence_electrons: u8,
) -> Element {
    Element { atomic_number, symbol, name, atomic_weight, valences, valence_electrons }
}

/// Elements 1 through 118; masses of elements without stable isotopes are
/// those of the longest-lived isotope.
static ELEMENTS: [Element; MAX_ATOMIC_NUMBER as usize] = [
    el(1, "H", "Hydrogen", 1.008, &[1], 1),
    el(2, "He", "Helium", 4.003, &[0], 2),
    el(3, "Li", "Lithium", 6.941, &[1], 1),
    el(4, "Be", "Beryllium", 9.012, &[2], 2),
    el(5, "B", "Boron", 10.812, &[3], 3),
    el(6, "C", "Carbon", 12.011, &[4], 4),
    el(7, "N", "Nitrogen", 14.007, &[3], 5),
    el(8, "O", "Oxygen", 15.999, &[2], 6),
    el(9, "F", "Fluorine", 18.998, &[1], 7),
    el(10, "Ne", "Neon", 20.180, &[0], 8),
    el(11, "Na", "Sodium", 22.990, &[1], 1),
    el(12, "Mg", "Magnesium", 24.305, &[2], 2),
    el(13, "Al", "Aluminum", 26.982, &[3], 3),
    el(14, "Si", "Silicon", 28.086, &[4], 4),
    el(15, "P", "Phosphorus", 30.974, &[3, 5, 7], 5),
    el(16, "S", "Sulfur", 32.067, &[2, 4, 6], 6),
    el(17, "Cl", "Chlorine", 35.453, &[1], 7),
    el(18, "Ar", "Argon", 39.948, &[0], 8),
    el(19, "K", "Potassium", 39.098, &[1], 1),
    el(20, "Ca", "Calcium", 40.078, &[2], 2),
    el(21, "Sc", "Scandium", 44.956, &[], 3),
    el(22, "Ti", "Titanium", 47.867, &[], 4),
    el(23, "V", "Vanadium", 50.942, &[], 5),
    el(24, "Cr", "Chromium", 51.996, &[], 6),
    el(25, "Mn", "Manganese", 54.938, &[], 7),
    el(26, "Fe", "Iron", 55.845, &[], 8),
    el(27, "Co", "Cobalt", 58.933, &[], 9),
    el(28, "Ni", "Nickel", 58.693, &[], 10),
    el(29, "Cu", "Copper", 63.546, &[], 11),
    el(30, "Zn", "Zinc", 65.39, &[], 2),
    el(31, "Ga", "Gallium", 69.723, &[3], 3),
    el(32, "Ge", "Germanium", 72.61, &[4], 4),
    el(33, "As", "Arsenic", 74.922, &[3, 5, 7], 5),
    el(34, "Se", "Selenium", 78.96, &[2, 4, 6], 6),
    el(35, "Br", "Bromine", 79.904, &[1], 7),
    el(36, "Kr", "Krypton", 83.80, &[0], 8),
    el(37, "Rb", "Rubidium", 85.468, &[1], 1),
    el(38, "Sr", "Strontium", 87.62, &[2], 2),
    el(39, "Y", "Yttrium", 88.906, &[], 3),
    el(40, "Zr", "Zirconium", 91.224, &[], 4),
    el(41, "Nb", "Niobium", 92.906, &[], 5),
    el(42, "Mo", "Molybdenum", 95.94, &[], 6),
    el(43, "Tc", "Technetium", 98.0, &[], 7),
    el(44, "Ru", "Ruthenium", 101.07, &[], 8),
    el(45, "Rh", "Rhodium", 102.906, &[], 9),
    el(46, "Pd", "Palladium", 106.42, &[], 10),
    el(47, "Ag", "Silver", 107.868, &[], 11),
    el(48, "Cd", "Cadmium", 112.412, &[], 2),
    el(49, "In", "Indium", 114.818, &[3], 3),
    el(50, "Sn", "Tin", 118.711, &[2, 4], 4),
    el(51, "Sb", "Antimony", 121.760, &[3, 5, 7], 5),
    el(52, "Te", "Tellurium", 127.60, &[2, 4, 6], 6),
    el(53, "I", "Iodine", 126.904, &[1, 3, 5], 7),
    el(54, "Xe", "Xenon", 131.29, &[0], 8),
    el(55, "Cs", "Cesium", 132.905, &[1], 1),
    el(56, "Ba", "Barium", 137.327, &[2], 2),
    el(57, "La", "Lanthanum", 138.905, &[], 3),
    el(58, "Ce", "Cerium", 140.116, &[], 4),
    el(59, "Pr", "Praseodymium", 140.908, &[], 5),
    el(60, "Nd", "Neodymium", 144.242, &[], 6),
    el(61, "Pm", "Promethium", 145.0, &[], 7),
    el(62, "Sm", "Samarium", 150.36, &[], 8),
    el(63, "Eu", "Europium", 151.964, &[], 9),
    el(64, "Gd", "Gadolinium", 157.25, &[], 10),
    el(65, "Tb", "Terbium", 158.925, &[], 11),
    el(66, "Dy", "Dysprosium", 162.500, &[], 12),
    el(67, "Ho", "Holmium", 164.930, &[], 13),
    el(68, "Er", "Erbium", 167.259, &[], 14),
    el(69, "Tm", "Thulium", 168.934, &[], 15),
    el(70, "Yb", "Ytterbium", 173.045, &[], 16),
    el(71, "Lu", "Lutetium", 174.967, &[], 3),
    el(72, "Hf", "Hafnium", 178.49, &[], 4),
    el(73, "Ta", "Tantalum", 180.948, &[], 5),
    el(74, "W", "Tungsten", 183.84, &[], 6),
    el(75, "Re", "Rhenium", 186.207, &[], 7),
    el(76, "Os", "Osmium", 190.23, &[], 8),
    el(77, "Ir", "Iridium", 192.217, &[], 9),
    el(78, "Pt", "Platinum", 195.084, &[], 10),
    el(79, "Au", "Gold", 196.967, &[], 11),
    el(80, "Hg", "Mercury", 200.592, &[], 2),
    el(81, "Tl", "Thallium", 204.383, &[1, 3], 3),
    el(82, "Pb", "Lead", 207.2, &[2, 4], 4),
    el(83, "Bi", "Bismuth", 208.980, &[3, 5], 5),
    el(84, "Po", "Polonium", 209.0, &[2, 4, 6], 6),
    el(85, "At", "Astatine", 210.0, &[1], 7),
    el(86, "Rn", "Radon", 222.0, &[0], 8),
    el(87, "Fr", "Francium", 223.0, &[1], 1),
    el(88, "Ra", "Radium", 226.0, &[2], 2),
    el(89, "Ac", "Actinium", 227.0, &[], 3),
    el(90, "Th", "Thorium", 232.038, &[], 4),
    el(91, "Pa", "Protactinium", 231.036, &[], 5),
    el(92, "U", "Uranium", 238.029, &[], 6),
    el(93, "Np", "Neptunium", 237.0, &[], 7),
    el(94, "Pu", "Plutonium", 244.0, &[], 8),
    el(95, "Am", "Americium", 243.0, &[], 9),
    el(96, "Cm", "Curium", 247.0, &[], 10),
    el(97, "Bk", "Berkelium", 247.0, &[], 11),
    el(98, "Cf", "Californium", 251.0, &[], 12),
    el(99, "Es", "Einsteinium", 252.0, &[], 13),
    el(100, "Fm", "Fermium", 257.0, &[], 14),
    el(101, "Md", "Mendelevium", 258.0, &[], 15),
    el(102, "No", "Nobelium", 259.0, &[], 16),
    el(103, "Lr", "Lawrencium", 262.0, &[], 3),
    el(104, "Rf", "Rutherfordium", 267.0, &[], 4),
    el(105, "Db", "Dubnium", 268.0, &[], 5),
    el(106, "Sg", "Seaborgium", 269.0, &[], 6),
    el(107, "Bh", "Bohrium", 270.0, &[], 7),
    el(108, "Hs", "Hassium", 269.0, &[], 8),
    el(109, "Mt", "Meitnerium", 278.0, &[], 9),
    el(110, "Ds", "Darmstadtium", 281.0, &[], 10),
    el(111, "Rg", "Roentgenium", 282.0, &[], 11),
    el(112, "Cn", "Copernicium", 285.0, &[], 2),
    el(113, "Nh", "Nihonium", 286.0, &[], 3),
    el(114, "Fl", "Flerovium", 289.0, &[], 4),
    el(115, "Mc", "Moscovium", 290.0, &[], 5),
    el(116, "Lv", "Livermorium", 293.0, &[], 6),
    el(117, "Ts", "Tennessine", 294.0, &[], 7),
    el(118, "Og", "Oganesson", 294.0, &[0], 8),
];

/// Look up an element by its symbol (e.g. "C", "Br").
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by its atomic number (1-based).
pub fn element_by_number(n: u8) -> Option<&'static Element> {
    if (1..=MAX_ATOMIC_NUMBER).contains(&n) {
        Some(&ELEMENTS[(n - 1) as usize])
    } else {
        None
    }
}

/// Average atomic weight, or 0.0 for unknown elements.
pub fn atomic_weight(n: u8) -> f64 {
    element_by_number(n).map(|e| e.atomic_weight).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_carbon_by_symbol() {
        let c = element_by_symbol("C").unwrap();
        assert_eq!(c.atomic_number, 6);
        assert!((c.atomic_weight - 12.011).abs() < 0.001);
        assert_eq!(c.default_valence(), Some(4));
        assert_eq!(c.valence_electrons, 4);
        assert_eq!(c.period(), 2);
    }

    #[test]
    fn sulfur_has_hypervalent_states() {
        let s = element_by_number(16).unwrap();
        assert_eq!(s.valences, &[2, 4, 6]);
        assert_eq!(s.period(), 3);
    }

    #[test]
    fn metals_take_no_implicit_hydrogen() {
        let fe = element_by_symbol("Fe").unwrap();
        assert_eq!(fe.default_valence(), None);
    }

    #[test]
    fn heavy_elements_common_in_toxicity_sets() {
        for (sym, z, period) in [("Ba", 56, 6), ("Gd", 64, 6), ("Pt", 78, 6), ("Hg", 80, 6), ("Pb", 82, 6), ("U", 92, 7)] {
            let e = element_by_symbol(sym).unwrap();
            assert_eq!(e.atomic_number, z);
            assert_eq!(e.period(), period);
        }
        assert!((atomic_weight(80) - 200.592).abs() < 1e-9);
        assert_eq!(element_by_symbol("Pb").unwrap().default_valence(), Some(2));
    }

    #[test]
    fn table_is_indexed_by_atomic_number() {
        for n in 1..=MAX_ATOMIC_NUMBER {
            assert_eq!(element_by_number(n).unwrap().atomic_number, n);
        }
        assert!(element_by_number(0).is_none());
        assert!(element_by_number(119).is_none());
        assert_eq!(atomic_weight(0), 0.0);
    }
}
