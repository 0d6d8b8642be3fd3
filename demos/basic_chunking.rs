//! Retrieval vs. Summarization Chunking
//!
//! The same note split two ways: boundary-aware overlapping chunks for
//! search, plain non-overlapping windows for map-reduce summarization.
//!
//! ```bash
//! cargo run --example basic_chunking
//! ```

use quarry::{Chunker, FixedChunker, RecursiveChunker};

fn main() {
    let document = r"Trip to Lisbon, packing list and plans.

Flights: TP1351 leaves Tuesday 07:40, back Sunday 21:15. Seats 14A and 14B.
Hotel: Casa do Largo, check-in after 15:00, booking ref LX-4471.

Day one is the Alfama walk and the tram 28 ride. Day two is Sintra; buy the combined ticket online the night before. Dinner on Thursday at 20:30, table for four.";

    println!("Document: {} chars\n", document.chars().count());

    println!("1. Retrieval chunks (300 chars, 100 overlap)");
    println!("   -----------------------------------------");
    let retrieval = RecursiveChunker::prose(300, 100);
    for segment in retrieval.chunk(document) {
        let preview: String = segment.text.chars().take(60).collect();
        println!(
            "   [{}] bytes {}-{}, {} chars: {:?}...",
            segment.index,
            segment.start,
            segment.end,
            segment.char_len(),
            preview
        );
    }
    println!("\n   Each chunk ends on a paragraph, line, sentence or word boundary.");

    println!("\n2. Summarization windows (150 chars, no overlap)");
    println!("   ---------------------------------------------");
    let windows = FixedChunker::no_overlap(150);
    for segment in windows.chunk(document) {
        let preview: String = segment.text.chars().take(60).collect();
        println!("   [{}] {} chars: {:?}...", segment.index, segment.char_len(), preview);
    }
    println!("\n   Windows cover the text once; the merge step stitches facts back together.");
}
