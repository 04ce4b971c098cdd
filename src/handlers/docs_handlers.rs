//! `GET /api-docs/openapi.json` — static OpenAPI 3 description of the API.

use axum::Json;
use serde_json::{Value, json};

pub async fn openapi() -> Json<Value> {
    Json(openapi_document())
}

fn openapi_document() -> Value {
    let error = json!({ "$ref": "#/components/schemas/Error" });
    let project = json!({ "$ref": "#/components/schemas/Project" });
    let project_id = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    });
    let error_response = |description: &str| {
        json!({
            "description": description,
            "content": { "application/json": { "schema": error } }
        })
    };

    let paths = json!({
        "/api/projects": {
            "get": {
                "summary": "List projects",
                "responses": {
                    "200": {
                        "description": "All projects",
                        "content": { "application/json": { "schema": { "type": "array", "items": project } } }
                    },
                    "500": error_response("Server error")
                }
            },
            "post": {
                "summary": "Create a project",
                "requestBody": {
                    "required": true,
                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NewProject" } } }
                },
                "responses": {
                    "201": { "description": "Created", "content": { "application/json": { "schema": project } } },
                    "400": error_response("Validation error"),
                    "500": error_response("Server error")
                }
            }
        },
        "/api/projects/{id}": {
            "parameters": [project_id],
            "get": {
                "summary": "Get a project",
                "responses": {
                    "200": { "description": "The project", "content": { "application/json": { "schema": project } } },
                    "404": error_response("Project not found")
                }
            },
            "put": {
                "summary": "Partially update a project",
                "requestBody": {
                    "required": true,
                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NewProject" } } }
                },
                "responses": {
                    "200": { "description": "Updated", "content": { "application/json": { "schema": project } } },
                    "400": error_response("Validation error"),
                    "404": error_response("Project not found")
                }
            },
            "delete": {
                "summary": "Delete a project and its files",
                "responses": {
                    "204": { "description": "Deleted" },
                    "404": error_response("Project not found")
                }
            }
        },
        "/api/projects/{id}/files": {
            "parameters": [project_id],
            "post": {
                "summary": "Upload up to 5 files (10 MiB each) in field `files`",
                "requestBody": {
                    "required": true,
                    "content": {
                        "multipart/form-data": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "files": {
                                        "type": "array",
                                        "maxItems": 5,
                                        "items": { "type": "string", "format": "binary" }
                                    }
                                }
                            }
                        }
                    }
                },
                "responses": {
                    "201": {
                        "description": "Files stored",
                        "content": { "application/json": { "schema": {
                            "type": "object",
                            "properties": {
                                "message": { "type": "string" },
                                "projectId": { "type": "string" },
                                "files": { "type": "array", "items": { "$ref": "#/components/schemas/Attachment" } }
                            }
                        } } }
                    },
                    "400": error_response("Rejected upload"),
                    "404": error_response("Project not found"),
                    "500": error_response("Server error")
                }
            },
            "get": {
                "summary": "List a project's files",
                "responses": {
                    "200": {
                        "description": "Files in upload order",
                        "content": { "application/json": { "schema": {
                            "type": "object",
                            "properties": {
                                "projectId": { "type": "string" },
                                "projectTitle": { "type": "string" },
                                "filesCount": { "type": "integer" },
                                "files": { "type": "array", "items": { "$ref": "#/components/schemas/Attachment" } }
                            }
                        } } }
                    },
                    "404": error_response("Project not found")
                }
            }
        },
        "/api/projects/{id}/files/stats": {
            "parameters": [project_id],
            "get": {
                "summary": "Aggregate file statistics",
                "responses": {
                    "200": { "description": "Statistics by category" },
                    "404": error_response("Project not found")
                }
            }
        },
        "/api/projects/{id}/files/{file_id}": {
            "parameters": [
                project_id,
                { "name": "file_id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }
            ],
            "delete": {
                "summary": "Remove one file",
                "responses": {
                    "200": { "description": "Removed" },
                    "404": error_response("Project or file not found")
                }
            }
        },
        "/api/files/{filename}": {
            "parameters": [
                { "name": "filename", "in": "path", "required": true, "schema": { "type": "string" } }
            ],
            "get": {
                "summary": "Download a stored file",
                "responses": {
                    "200": { "description": "File content" },
                    "404": error_response("File not found")
                }
            }
        }
    });

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Project management API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Projects with tasks and file attachments."
        },
        "paths": paths,
        "components": { "schemas": schemas() }
    })
}

fn schemas() -> Value {
    json!({
        "Error": {
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "status": { "type": "integer" },
                "error": { "type": "string" }
            }
        },
        "Task": {
            "type": "object",
            "required": ["name"],
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "name": { "type": "string" },
                "completed": { "type": "boolean" }
            }
        },
        "NewProject": {
            "type": "object",
            "required": ["title"],
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" },
                "startDate": { "type": "string", "format": "date" },
                "endDate": { "type": "string", "format": "date" },
                "status": { "type": "string", "enum": ["not_started", "in_progress", "completed"] },
                "tasks": { "type": "array", "items": { "$ref": "#/components/schemas/Task" } }
            }
        },
        "Attachment": {
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "filename": { "type": "string" },
                "originalName": { "type": "string" },
                "mimetype": { "type": "string" },
                "size": { "type": "integer" },
                "formattedSize": { "type": "string" },
                "category": {
                    "type": "string",
                    "enum": ["image", "document", "pdf", "spreadsheet", "presentation", "other"]
                },
                "uploadedAt": { "type": "string", "format": "date-time" },
                "url": { "type": "string" }
            }
        },
        "Project": {
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "startDate": { "type": "string", "format": "date" },
                "endDate": { "type": "string", "format": "date" },
                "status": { "type": "string" },
                "tasks": { "type": "array", "items": { "$ref": "#/components/schemas/Task" } },
                "files": { "type": "array", "items": { "$ref": "#/components/schemas/Attachment" } },
                "createdAt": { "type": "string", "format": "date-time" },
                "updatedAt": { "type": "string", "format": "date-time" }
            }
        }
    })
}
