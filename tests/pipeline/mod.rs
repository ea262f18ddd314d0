mod pipeline_context;
