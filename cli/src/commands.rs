use std::path::Path;

use anyhow::{Context, Result, bail};
use rigpa_dictionary::DictionaryClient;
use rigpa_knowledge::{
    DocumentType, KnowledgeBase, KnowledgeConfig, KnowledgeDocument, builtin_terms, load_terms,
};
use tracing::info;

use crate::definitions::DefinitionStore;
use crate::{Cli, Commands, DictionarySource};

/// Characters of content shown per document by `list`.
const PREVIEW_CHARS: usize = 80;

pub async fn run(cli: Cli, config: KnowledgeConfig) -> Result<()> {
    let kb = KnowledgeBase::from_config(&config).await;

    let terms = match &cli.corpus {
        Some(path) => load_terms(path)
            .await
            .with_context(|| format!("loading corpus {}", path.display()))?,
        None => builtin_terms().context("parsing bundled corpus")?,
    };
    kb.initialize(&terms, &[]).await;

    let definitions = DefinitionStore::from_config(&config);
    definitions.load_into(&kb).await;

    match cli.command {
        Commands::Stats => stats(&kb).await,
        Commands::Search { query, top_k } => {
            search(&kb, &query, top_k.unwrap_or(config.search.top_k)).await
        }
        Commands::Prompt { query, base } => {
            println!("{}", kb.enhanced_prompt(&query, &base).await);
            Ok(())
        }
        Commands::List { doc_type } => {
            let documents = match doc_type {
                Some(doc_type) => kb.documents_by_type(doc_type).await,
                None => kb.all_documents().await,
            };
            for doc in &documents {
                println!("{}\t{}\t{}", doc.id, doc.doc_type(), preview(&doc.content));
            }
            Ok(())
        }
        Commands::Add { text } => {
            let doc = KnowledgeDocument::user_text(text);
            let id = doc.id.clone();
            kb.add_documents(vec![doc]).await;
            println!("{id}");
            Ok(())
        }
        Commands::Remove { id } => remove(&kb, &definitions, &id).await,
        Commands::Export { file } => {
            let json = kb.export_custom_texts().await?;
            match file {
                Some(path) => {
                    write_file(&path, &json).await?;
                    info!("Exported custom texts to {}", path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Commands::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let count = kb
                .import_custom_texts(&json)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            definitions.save_from(&kb).await?;
            println!("Imported {count} documents");
            Ok(())
        }
        Commands::Clear => {
            kb.clear().await;
            definitions.clear().await?;
            println!("Knowledge base cleared");
            Ok(())
        }
        Commands::Dictionary { source, output } => {
            let client = DictionaryClient::from_config(&config.dictionary);
            dictionary(&kb, &definitions, &client, source, output.as_deref()).await
        }
    }
}

async fn stats(kb: &KnowledgeBase) -> Result<()> {
    let stats = kb.stats().await;
    println!("documents:  {}", stats.total_documents);
    println!("embedded:   {}", stats.with_embeddings);
    println!("ready:      {}", stats.ready);
    println!("search:     {}", kb.search_mode().await);
    Ok(())
}

async fn search(kb: &KnowledgeBase, query: &str, top_k: usize) -> Result<()> {
    let outcome = kb.search_detailed(query, top_k).await;
    info!("{} results ({} search)", outcome.results.len(), outcome.mode);

    for (idx, result) in outcome.results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            idx + 1,
            result.score,
            result.document.id,
            result.document.doc_type()
        );
        println!("   {}", result.document.content);
    }
    Ok(())
}

async fn remove(kb: &KnowledgeBase, definitions: &DefinitionStore, id: &str) -> Result<()> {
    let documents = kb.all_documents().await;
    let Some(doc) = documents.iter().find(|d| d.id == id) else {
        bail!("no document with id {id}");
    };
    if !doc.is_deletable() {
        bail!("{id} is part of the terminology corpus and cannot be removed");
    }
    let was_definition = doc.doc_type() == DocumentType::Definition;

    kb.remove_document(id).await;
    if was_definition {
        definitions.save_from(kb).await?;
    }
    println!("Removed {id}");
    Ok(())
}

async fn dictionary(
    kb: &KnowledgeBase,
    definitions: &DefinitionStore,
    client: &DictionaryClient,
    source: DictionarySource,
    output: Option<&Path>,
) -> Result<()> {
    let mut progress = |done: usize, total: usize| {
        eprint!("\r{done}/{total}");
        if done == total {
            eprintln!();
        }
    };

    let documents = match source {
        DictionarySource::Terms { mut terms, file } => {
            if let Some(path) = file {
                terms.extend(rigpa_dictionary::parse_list(&read_file(&path).await?));
            }
            client.import_terms(&terms, &mut progress).await
        }
        DictionarySource::Common => client.import_common_terms(&mut progress).await,
        DictionarySource::Url { urls, file } => {
            let mut list = urls.join("\n");
            if let Some(path) = file {
                list.push('\n');
                list.push_str(&read_file(&path).await?);
            }
            client.import_url_list(&list, &mut progress).await
        }
        DictionarySource::Category { name, limit } => client
            .import_category(&name, limit, &mut progress)
            .await
            .with_context(|| format!("listing category {name}"))?,
        DictionarySource::Search { term, limit } => {
            for title in client.search_titles(&term, limit).await? {
                match title.url {
                    Some(url) => println!("{}\t{url}", title.title),
                    None => println!("{}", title.title),
                }
            }
            return Ok(());
        }
        DictionarySource::Stats => {
            if !client.test_connection().await {
                bail!("dictionary wiki is not reachable");
            }
            let stats = client.site_stats().await?;
            println!("site:      {}", stats.sitename);
            println!("articles:  {}", stats.articles);
            println!("pages:     {}", stats.pages);
            return Ok(());
        }
    };

    let count = documents.len();
    if let Some(path) = output {
        write_file(path, &serde_json::to_string_pretty(&documents)?).await?;
        info!("Wrote {count} definitions to {}", path.display());
    }
    kb.add_documents(documents).await;
    let saved = definitions.save_from(kb).await?;
    println!("Imported {count} dictionary entries ({saved} definitions saved)");
    Ok(())
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_CHARS || line.len() < content.len() {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}
