use crate::cli::context::CliContext;
use crate::cli::utils::output_modules;
use crate::cli::OutputFormat;

pub async fn handle(search: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::from_config(crate::config::config())?;

    if let Err(refusal) = ctx.require_ready().await {
        return refusal.report(&output_format);
    }

    let modules = ctx.portal.filter_modules(search.as_deref().unwrap_or(""));
    let favorites = ctx.portal.favorites().favorites();
    output_modules(
        &output_format,
        "modules",
        &modules,
        &favorites,
        "Nenhum módulo disponível para o seu usuário. Contate o administrador.",
    )
}
