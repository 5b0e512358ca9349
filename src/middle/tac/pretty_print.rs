use colored::Colorize;

use crate::middle::tac::TacUnit;

/// Prints the quad listing for a unit, one line per quad with jump
/// labels on their own lines.
pub fn print_tac(unit: &TacUnit) {
    for (label, quad) in unit.iter() {
        if let Some(label) = label {
            println!("{}", format!("{label}:").bright_red());
        }

        println!(
            "    {}{} {}{} {}{} {}",
            quad.op.to_string().cyan(),
            ",".white(),
            quad.target,
            ",".white(),
            quad.opd1,
            ",".white(),
            quad.opd2
        );
    }
}
