fn main() -> anyhow::Result<()> {
	procdb::cli::main()
}
