use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use url::Url;

#[derive(Parser)]
#[command(name = "varta")]
#[command(about = "A CLI for publishing and browsing Varta content")]
struct Cli {
    /// Base URL for the Varta service
    #[arg(long, default_value = "http://localhost:3000")]
    service_url: String,

    /// Caller id forwarded as X-Author-Id
    #[arg(long, global = true)]
    author_id: Option<String>,

    /// Caller role forwarded as X-Author-Role
    #[arg(long, global = true, default_value = "writer")]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    News,
    Gallery,
    Videos,
}

impl Kind {
    fn collection(self) -> &'static str {
        match self {
            Kind::News => "news",
            Kind::Gallery => "gallery",
            Kind::Videos => "videos",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a new item
    Create {
        kind: Kind,
        #[arg(long)]
        title_en: String,
        #[arg(long)]
        title_te: String,
        #[arg(long, default_value = "")]
        description_en: String,
        #[arg(long, default_value = "")]
        description_te: String,
        #[arg(long, default_value = "")]
        category_en: String,
        #[arg(long, default_value = "")]
        category_te: String,
        /// Comma separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        main_url: Option<String>,
        /// Kind-specific details as JSON, e.g. '{"youtubeId":"abc"}'
        #[arg(long)]
        details: Option<String>,
    },
    /// List a collection, newest first
    List {
        kind: Kind,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, conflicts_with_all = ["cursor", "all"])]
        page: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
        /// Follow cursors until the end of the collection
        #[arg(long)]
        all: bool,
    },
    /// Show one item by slug
    Get { kind: Kind, slug: String },
}

#[derive(Serialize)]
struct Bilingual {
    en: String,
    te: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentPayload {
    title: Bilingual,
    description: Bilingual,
    category: Bilingual,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    items: Vec<Value>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
    total_pages: Option<u64>,
    current_page: Option<u32>,
}

struct Api {
    client: Client,
    base: Url,
    author_id: Option<String>,
    role: String,
}

impl Api {
    fn endpoint(&self, path: &str) -> Result<Url, Box<dyn Error>> {
        Ok(self.base.join(path)?)
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.author_id {
            Some(id) => request
                .header("X-Author-Id", id)
                .header("X-Author-Role", &self.role),
            None => request,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base: Url::parse(&cli.service_url)?,
        author_id: cli.author_id,
        role: cli.role,
    };

    match cli.command {
        Commands::Create {
            kind,
            title_en,
            title_te,
            description_en,
            description_te,
            category_en,
            category_te,
            tags,
            main_url,
            details,
        } => {
            let details = details.map(|raw| serde_json::from_str(&raw)).transpose()?;
            let payload = ContentPayload {
                title: Bilingual {
                    en: title_en,
                    te: title_te,
                },
                description: Bilingual {
                    en: description_en,
                    te: description_te,
                },
                category: Bilingual {
                    en: category_en,
                    te: category_te,
                },
                tags,
                main_url,
                details,
            };
            create_content(&api, kind, &payload).await?;
        }
        Commands::List {
            kind,
            limit,
            page,
            cursor,
            all,
        } => {
            list_content(&api, kind, limit, page, cursor, all).await?;
        }
        Commands::Get { kind, slug } => {
            get_content(&api, kind, &slug).await?;
        }
    }

    Ok(())
}

async fn create_content(
    api: &Api,
    kind: Kind,
    payload: &ContentPayload,
) -> Result<(), Box<dyn Error>> {
    let endpoint = api.endpoint(&format!("/api/v1/{}", kind.collection()))?;
    let response = api
        .with_identity(api.client.post(endpoint))
        .json(payload)
        .send()
        .await?;

    if response.status().is_success() {
        let item: Value = response.json().await?;
        println!(
            "Created {} '{}' (id {})",
            kind.collection(),
            item["slug"].as_str().unwrap_or_default(),
            item["id"]
        );
    } else {
        eprintln!("Failed to create content: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
    }

    Ok(())
}

fn print_item(item: &Value) {
    println!(
        "{:<40} {:<28} {}",
        item["slug"].as_str().unwrap_or_default(),
        item["createdAt"].as_str().unwrap_or_default(),
        item["title"]["en"].as_str().unwrap_or_default()
    );
}

async fn list_content(
    api: &Api,
    kind: Kind,
    limit: u32,
    page: Option<u32>,
    mut cursor: Option<String>,
    all: bool,
) -> Result<(), Box<dyn Error>> {
    loop {
        let mut endpoint = api.endpoint(&format!("/api/v1/{}", kind.collection()))?;
        {
            let mut query = endpoint.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(page) = page {
                query.append_pair("page", &page.to_string());
            }
            if let Some(cursor) = &cursor {
                query.append_pair("cursor", cursor);
            }
        }

        let response = api.client.get(endpoint).send().await?;
        if !response.status().is_success() {
            eprintln!("Failed to list content: {}", response.status());
            eprintln!("Response: {}", response.text().await?);
            return Ok(());
        }

        let listing: ListResponse = response.json().await?;
        listing.items.iter().for_each(print_item);

        if let (Some(current), Some(total)) = (listing.current_page, listing.total_pages) {
            println!("Page {current} of {total}");
            return Ok(());
        }

        match listing.next_cursor {
            Some(next) if all && listing.has_more => cursor = Some(next),
            Some(next) if listing.has_more => {
                println!("More items: --cursor {next}");
                return Ok(());
            }
            _ => return Ok(()),
        }
    }
}

async fn get_content(api: &Api, kind: Kind, slug: &str) -> Result<(), Box<dyn Error>> {
    let endpoint = api.endpoint(&format!("/api/v1/{}/slug/{slug}", kind.collection()))?;
    let response = api.client.get(endpoint).send().await?;

    if response.status().is_success() {
        let item: Value = response.json().await?;
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        eprintln!("Failed to get content: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
    }

    Ok(())
}
