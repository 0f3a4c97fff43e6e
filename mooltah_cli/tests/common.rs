use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

/// `mooltah` with color disabled and no inherited log filter.
pub fn mooltah_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("mooltah"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("MOOLTAH_LOG");
	cmd
}
