//! Connects to the server named by `BOOKMUX_SERVER`, prints the tag tree and,
//! when a URL is given as the first argument, the bookmarks saved for it.

use bookmux::constants::ROOT_TAG_TITLE;
use bookmux::model::TagNode;
use bookmux_tokio_rpc_client::ClientConfig;
use bookmux_tokio_rpc_client::auth::create_logged_in_client;
use tracing_subscriber::EnvFilter;

fn print_tree(node: &TagNode, depth: usize) {
    let title = if depth == 0 {
        ROOT_TAG_TITLE.to_string()
    } else {
        node.title()
    };
    println!("{}{} [{}]", "  ".repeat(depth), title, node.id);

    for subtag in node.subtags() {
        print_tree(subtag, depth + 1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!("Connecting to {}", config.server);

    // The token, if any, is already part of the configuration.
    let client = create_logged_in_client(config, None).await?;

    let tree = client.get_tags_tree().await?;
    print_tree(&tree, 0);

    if let Some(url) = std::env::args().nth(1) {
        let bookmarks = client.get_bookmarks_by_url(&url).await?;
        if bookmarks.is_empty() {
            println!("No bookmarks for {url}");
        }
        for bookmark in bookmarks {
            let tags: Vec<String> = bookmark
                .tag_ids
                .iter()
                .map(|id| {
                    tree.find(*id)
                        .map(TagNode::title)
                        .unwrap_or_else(|| id.to_string())
                })
                .collect();
            println!("{} - {} ({})", bookmark.title, bookmark.url, tags.join("; "));
        }
    }

    client.close();
    Ok(())
}
