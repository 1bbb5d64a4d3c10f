use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = polytag_admin::Args::parse();

	polytag_admin::run(args).await
}
