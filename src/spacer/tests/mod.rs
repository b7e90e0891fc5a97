mod helpers;
mod integration_chunk;
