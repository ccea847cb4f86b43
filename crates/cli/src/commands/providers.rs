//! `rollcall providers`: List supported oracle providers.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🤖 Supported Providers");
    println!("======================");
    println!();
    println!("  The oracle needs a vision-capable model for image extraction.");
    println!();
    println!("  Built-in providers:");
    for (name, auth) in [
        ("openrouter", "API key"),
        ("openai", "API key"),
        ("anthropic", "API key"),
        ("groq", "API key"),
        ("together", "API key"),
        ("ollama", "None (local)"),
        ("vllm", "None (local)"),
    ] {
        println!(
            "    {name:<12} {:<34} {auth}",
            rollcall_providers::router::default_base_url(name).unwrap_or("-")
        );
    }
    println!();
    println!("  Custom endpoints:");
    println!("    Any OpenAI-compatible API works out of the box:");
    println!("    default_provider = \"mine\"");
    println!("    [providers.mine]");
    println!("    api_url = \"https://your-custom-endpoint.com/v1\"");
    println!("    api_key = \"your-key\"");
    println!();
    println!("  Environment variables:");
    println!("    ROLLCALL_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY");
    println!("    ROLLCALL_PROVIDER, ROLLCALL_MODEL");

    Ok(())
}
