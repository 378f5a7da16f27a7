use apm_cli::{command, init_tracing, run, AnnotateOptions};
use apm_docs::{DocumentFetcher, FetchConfig, HttpDocumentSource};

fn main() -> anyhow::Result<()> {
    let matches = command().get_matches();
    let options = AnnotateOptions::from_matches(&matches)?;
    init_tracing(options.verbose);

    let source = HttpDocumentSource::new(&FetchConfig::new())?;
    let reports = run(&options, &DocumentFetcher::new(source))?;

    let documented: usize = reports.iter().map(|r| r.documented).sum();
    tracing::info!("Annotated {} files, {documented} parameters documented", reports.len());
    Ok(())
}
