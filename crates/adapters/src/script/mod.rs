pub mod handlebars_engine;
